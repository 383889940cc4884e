//! SQL syntax checking for the agent's tools.
//!
//! Parses statements with `sqlparser` in the dialect of the connected backend.
//! Nothing here touches the database.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, MsSqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::{Parser, ParserError};

use crate::connection::BackendKind;

/// Returns the parser dialect for a backend.
pub fn dialect_for(backend: BackendKind) -> Box<dyn Dialect> {
    match backend {
        BackendKind::Sqlite => Box::new(SQLiteDialect {}),
        BackendKind::Postgres => Box::new(PostgreSqlDialect {}),
        BackendKind::SqlServer => Box::new(MsSqlDialect {}),
    }
}

/// Parses `sql` into statements using the backend's dialect.
pub fn parse(backend: BackendKind, sql: &str) -> Result<Vec<Statement>, ParserError> {
    let dialect = dialect_for(backend);
    Parser::parse_sql(dialect.as_ref(), sql)
}

/// Reviews a query without running it and describes what was found.
pub fn check_query(backend: BackendKind, sql: &str) -> String {
    let sql = sql.trim();
    if sql.is_empty() {
        return "Error: the query is empty.".to_string();
    }

    match parse(backend, sql) {
        Ok(statements) if statements.is_empty() => "Error: the query is empty.".to_string(),
        Ok(statements) => {
            if statements.iter().all(is_read_only) {
                format!(
                    "The query is valid {} syntax. Run it with sql_db_query.",
                    backend.display_name()
                )
            } else {
                format!(
                    "The query parses, but it modifies the database. Only SELECT queries are \
                     allowed. Rewrite it as a read-only query.\n\n{sql}"
                )
            }
        }
        Err(e) => format!("Syntax error: {e}\n\nFix the query before running it:\n{sql}"),
    }
}

/// Returns a refusal message when `sql` parses to anything but read-only queries.
///
/// Statements the parser cannot handle are left to the database to judge.
pub fn refuse_if_writing(backend: BackendKind, sql: &str) -> Option<String> {
    let statements = parse(backend, sql).ok()?;
    if statements.iter().all(is_read_only) {
        return None;
    }

    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    Some(format!(
        "Error: {keyword} statements are not allowed. Only read-only SELECT queries may be run."
    ))
}

/// Whether a statement only reads data.
pub fn is_read_only(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => query_is_read_only(query),
        _ => false,
    }
}

// Postgres allows data-modifying statements inside WITH clauses.
fn query_is_read_only(query: &Query) -> bool {
    let ctes_read_only = query
        .with
        .as_ref()
        .map(|with| with.cte_tables.iter().all(|cte| query_is_read_only(&cte.query)))
        .unwrap_or(true);

    ctes_read_only && set_expr_is_read_only(&query.body)
}

fn set_expr_is_read_only(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => true,
        SetExpr::Query(query) => query_is_read_only(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_read_only(left) && set_expr_is_read_only(right)
        }
        _ => false,
    }
}
