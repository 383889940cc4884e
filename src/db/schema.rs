//! Database schema types.
//!
//! Backends introspect into these types; the agent's schema tool renders
//! them as `CREATE TABLE` statements the model can read.

/// The introspected structure of a database.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// All user tables.
    pub tables: Vec<Table>,

    /// Foreign key relationships between tables.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table names in introspection order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Looks a table up by name, ignoring ASCII case.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Renders one table as a `CREATE TABLE` statement, including the
    /// foreign keys that originate from it.
    pub fn table_ddl(&self, table: &Table) -> String {
        let mut lines: Vec<String> = table.columns.iter().map(Column::ddl_line).collect();

        if !table.primary_key.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", table.primary_key.join(", ")));
        }

        lines.extend(
            self.foreign_keys
                .iter()
                .filter(|fk| fk.from_table == table.name)
                .map(|fk| {
                    format!(
                        "FOREIGN KEY({}) REFERENCES {} ({})",
                        fk.from_columns.join(", "),
                        fk.to_table,
                        fk.to_columns.join(", ")
                    )
                }),
        );

        format!("CREATE TABLE {} (\n\t{}\n)", table.name, lines.join(",\n\t"))
    }
}

/// A database table.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<Column>,

    /// Column names that form the primary key.
    pub primary_key: Vec<String>,
}

impl Table {
    /// Creates a new table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }
}

/// A column in a table.
#[derive(Debug, Clone, Default)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type (e.g., "integer", "varchar(255)").
    pub data_type: String,

    /// Whether the column allows NULL values.
    pub is_nullable: bool,

    /// Default value expression, if any.
    pub default: Option<String>,
}

impl Column {
    /// Creates a new nullable column with the given name and data type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            default: None,
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }

    /// Sets the default value.
    pub fn with_default(self, default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
            ..self
        }
    }

    fn ddl_line(&self) -> String {
        let mut line = format!("{} {}", self.name, self.data_type.to_uppercase());
        if !self.is_nullable {
            line.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            line.push_str(" DEFAULT ");
            line.push_str(default);
        }
        line
    }
}

/// A foreign key relationship between tables.
#[derive(Debug, Clone, Default)]
pub struct ForeignKey {
    /// Source table name.
    pub from_table: String,

    /// Source column names.
    pub from_columns: Vec<String>,

    /// Target table name.
    pub to_table: String,

    /// Target column names.
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    /// Creates a new foreign key relationship.
    pub fn new(
        from_table: impl Into<String>,
        from_columns: Vec<String>,
        to_table: impl Into<String>,
        to_columns: Vec<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_columns,
            to_table: to_table.into(),
            to_columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn todo_schema() -> Schema {
        Schema {
            tables: vec![
                Table {
                    name: "users".to_string(),
                    columns: vec![
                        Column::new("id", "integer").nullable(false),
                        Column::new("name", "text").nullable(false),
                        Column::new("email", "text"),
                    ],
                    primary_key: vec!["id".to_string()],
                },
                Table {
                    name: "todos".to_string(),
                    columns: vec![
                        Column::new("id", "integer").nullable(false),
                        Column::new("user_id", "integer").nullable(false),
                        Column::new("title", "text").nullable(false),
                        Column::new("completed", "boolean").with_default("0"),
                    ],
                    primary_key: vec!["id".to_string()],
                },
            ],
            foreign_keys: vec![ForeignKey::new(
                "todos",
                vec!["user_id".to_string()],
                "users",
                vec!["id".to_string()],
            )],
        }
    }

    #[test]
    fn test_table_ddl_with_foreign_key() {
        let schema = todo_schema();
        let todos = schema.table("todos").unwrap();
        assert_eq!(
            schema.table_ddl(todos),
            "CREATE TABLE todos (\n\
             \tid INTEGER NOT NULL,\n\
             \tuser_id INTEGER NOT NULL,\n\
             \ttitle TEXT NOT NULL,\n\
             \tcompleted BOOLEAN DEFAULT 0,\n\
             \tPRIMARY KEY (id),\n\
             \tFOREIGN KEY(user_id) REFERENCES users (id)\n\
             )"
        );
    }

    #[test]
    fn test_table_ddl_without_foreign_key() {
        let schema = todo_schema();
        let users = schema.table("users").unwrap();
        let ddl = schema.table_ddl(users);
        assert!(ddl.starts_with("CREATE TABLE users ("));
        assert!(!ddl.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_table_lookup_ignores_case() {
        let schema = todo_schema();
        assert!(schema.table("USERS").is_some());
        assert!(schema.table(" todos ").is_some());
        assert!(schema.table("categories").is_none());
        assert_eq!(schema.table_names(), vec!["users", "todos"]);
    }

    #[test]
    fn test_column_builder() {
        let col = Column::new("email", "varchar(255)")
            .nullable(false)
            .with_default("''");

        assert_eq!(col.name, "email");
        assert!(!col.is_nullable);
        assert_eq!(col.default, Some("''".to_string()));
    }

    #[test]
    fn test_empty_schema() {
        let schema = Schema::new();
        assert!(schema.table_names().is_empty());
    }
}
