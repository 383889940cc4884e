//! SQLite database client implementation.
//!
//! Opens (and creates, if missing) a local database file through sqlx.

use crate::connection::BackendKind;
use crate::db::{
    Column, ColumnInfo, DatabaseClient, ForeignKey, ResultSet, Row, Schema, Table, Value,
    MAX_ROWS, QUERY_TIMEOUT_SECS,
};
use crate::error::{DbAskError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo, ValueRef};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens the database file at `path`, creating it and its parent
    /// directories when they do not exist yet.
    pub async fn connect(path: &str) -> Result<Self> {
        let file = Path::new(path);
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbAskError::connection(format!(
                    "Cannot create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(file)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                DbAskError::connection(format!("Cannot open SQLite database '{path}': {e}"))
            })?;

        debug!(path, "Opened SQLite database");
        Ok(Self { pool })
    }

    async fn fetch_tables(&self) -> Result<Vec<Table>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbAskError::query(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.fetch_table(name).await?);
        }
        Ok(tables)
    }

    async fn fetch_table(&self, name: String) -> Result<Table> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?)"#,
        )
        .bind(&name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbAskError::query(format!("Failed to fetch columns for {name}: {e}")))?;

        let mut keyed: Vec<(i64, String)> = rows
            .iter()
            .filter(|(_, _, _, _, pk)| *pk > 0)
            .map(|(col, _, _, _, pk)| (*pk, col.clone()))
            .collect();
        keyed.sort();

        let columns = rows
            .into_iter()
            .map(|(col, data_type, not_null, default, _)| Column {
                name: col,
                data_type,
                is_nullable: not_null == 0,
                default,
            })
            .collect();

        Ok(Table {
            name,
            columns,
            primary_key: keyed.into_iter().map(|(_, col)| col).collect(),
        })
    }

    async fn fetch_foreign_keys(&self, tables: &[Table]) -> Result<Vec<ForeignKey>> {
        let mut keys = Vec::new();
        for table in tables {
            let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
                r#"SELECT id, "table", "from", "to" FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
            )
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DbAskError::query(format!(
                    "Failed to fetch foreign keys for {}: {e}",
                    table.name
                ))
            })?;

            let mut current: Option<(i64, ForeignKey)> = None;
            for (id, to_table, from, to) in rows {
                let to = to.unwrap_or_else(|| "rowid".to_string());
                match current.as_mut() {
                    Some((cur, fk)) if *cur == id => {
                        fk.from_columns.push(from);
                        fk.to_columns.push(to);
                    }
                    _ => {
                        if let Some((_, fk)) = current.take() {
                            keys.push(fk);
                        }
                        current = Some((
                            id,
                            ForeignKey::new(table.name.clone(), vec![from], to_table, vec![to]),
                        ));
                    }
                }
            }
            if let Some((_, fk)) = current {
                keys.push(fk);
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        let tables = self.fetch_tables().await?;
        let foreign_keys = self.fetch_foreign_keys(&tables).await?;
        Ok(Schema {
            tables,
            foreign_keys,
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<ResultSet> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            sqlx::query(sql).fetch_all(&self.pool),
        )
        .await
        .map_err(|_| {
            DbAskError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| DbAskError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let total_rows = result.len();
        let was_truncated = total_rows > MAX_ROWS;
        if was_truncated {
            warn!(total_rows, max_rows = MAX_ROWS, "Truncating SQLite result set");
        }

        let rows: Vec<Row> = result.iter().take(MAX_ROWS).map(convert_row).collect();
        let row_count = rows.len();

        Ok(ResultSet {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
///
/// SQLite is dynamically typed, so the storage class of each value decides
/// how it is decoded rather than the declared column type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|index| convert_value(row, index))
        .collect()
}

fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match storage.as_str() {
        "INTEGER" => row
            .try_get_unchecked::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get_unchecked::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => format!("ERROR: {}", db_error.message()),
        None => error.to_string(),
    }
}
