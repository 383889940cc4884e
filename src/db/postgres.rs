//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::connection::{render_uri, BackendKind, ConnectionDescriptor};
use crate::db::{
    Column, ColumnInfo, DatabaseClient, ForeignKey, ResultSet, Row, Schema, Table, Value,
    MAX_ROWS, QUERY_TIMEOUT_SECS,
};
use crate::error::{DbAskError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Decimal;
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Connects to the server a Postgres descriptor names.
    ///
    /// A single attempt is made; failures are mapped to a readable message.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let uri = render_uri(descriptor);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&uri)
            .await
            .map_err(|e| map_connection_error(e, descriptor))?;

        debug!(database = %descriptor.label(), "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Fetches all tables from the public schema.
    async fn fetch_tables(&self) -> Result<Vec<Table>> {
        let table_names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbAskError::query(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(table_names.len());

        for table_name in table_names {
            let columns = self.fetch_columns(&table_name).await?;
            let primary_key = self.fetch_primary_key(&table_name).await?;

            tables.push(Table {
                name: table_name,
                columns,
                primary_key,
            });
        }

        Ok(tables)
    }

    /// Fetches columns for a specific table.
    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT
                column_name::text,
                data_type::text,
                is_nullable::text,
                column_default::text
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DbAskError::query(format!("Failed to fetch columns for {table_name}: {e}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, is_nullable, default)| Column {
                name,
                data_type,
                is_nullable: is_nullable == "YES",
                default,
            })
            .collect())
    }

    /// Fetches primary key columns for a specific table.
    async fn fetch_primary_key(&self, table_name: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT kcu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_schema = 'public'
                AND tc.table_name = $1
                AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY kcu.ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DbAskError::query(format!("Failed to fetch primary key for {table_name}: {e}"))
        })
    }

    /// Fetches all foreign key relationships, grouped by constraint.
    async fn fetch_foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                tc.constraint_name::text,
                kcu.table_name::text AS from_table,
                kcu.column_name::text AS from_column,
                ccu.table_name::text AS to_table,
                ccu.column_name::text AS to_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_name = ccu.constraint_name
                AND tc.table_schema = ccu.table_schema
            WHERE tc.table_schema = 'public'
                AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY kcu.table_name, tc.constraint_name, kcu.ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbAskError::query(format!("Failed to fetch foreign keys: {e}")))?;

        let mut order: Vec<String> = Vec::new();
        let mut by_constraint: HashMap<String, ForeignKey> = HashMap::new();

        for (constraint, from_table, from_column, to_table, to_column) in rows {
            let fk = by_constraint.entry(constraint.clone()).or_insert_with(|| {
                order.push(constraint);
                ForeignKey::new(from_table, Vec::new(), to_table, Vec::new())
            });
            fk.from_columns.push(from_column);
            fk.to_columns.push(to_column);
        }

        Ok(order
            .into_iter()
            .filter_map(|name| by_constraint.remove(&name))
            .collect())
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        let tables = self.fetch_tables().await?;
        let foreign_keys = self.fetch_foreign_keys().await?;

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
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, MAX_ROWS
            );
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

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Decodes one column as `T`, mapping NULL and decode failures to `Value::Null`.
fn decode<'r, T>(row: &'r PgRow, index: usize, wrap: impl FnOnce(T) -> Value) -> Value
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .ok()
        .flatten()
        .map(wrap)
        .unwrap_or(Value::Null)
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index, Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index, |v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index, |v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => decode::<i64>(row, index, Value::Int),
        "FLOAT4" | "REAL" => decode::<f32>(row, index, |v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index, Value::Float),
        "NUMERIC" => decode::<Decimal>(row, index, |v| Value::String(v.to_string())),
        "DATE" => decode::<NaiveDate>(row, index, |v| Value::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, index, |v| Value::String(v.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index, |v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index, |v| Value::String(v.to_rfc3339())),
        "BYTEA" => decode::<Vec<u8>>(row, index, Value::Bytes),
        _ => decode::<String>(row, index, Value::String),
    }
}

/// Maps sqlx connection errors to user-facing messages.
fn map_connection_error(error: sqlx::Error, descriptor: &ConnectionDescriptor) -> DbAskError {
    let (host, port, user, database) = match descriptor {
        ConnectionDescriptor::Postgres {
            host,
            port,
            username,
            database,
            ..
        } => (host.as_str(), *port, username.as_str(), database.as_str()),
        _ => ("localhost", 5432, "", ""),
    };

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        DbAskError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        DbAskError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        DbAskError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        DbAskError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        DbAskError::connection(error.to_string())
    }
}

/// Formats a query error with detail and hint if the server sent them.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());
    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests need a running PostgreSQL server and are skipped unless
    // DATABASE_URL is set.

    async fn get_test_client() -> Option<PostgresClient> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let descriptor = ConnectionDescriptor::from_uri(&url).ok()?;
        PostgresClient::connect(&descriptor).await.ok()
    }

    #[tokio::test]
    async fn test_execute_select_query() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let result = client
            .execute_query("SELECT 1 as num, 'hello' as greeting, 2.50::numeric as price")
            .await
            .unwrap();

        assert_eq!(result.columns.len(), 3);
        assert_eq!(result.columns[0].name, "num");
        assert_eq!(result.rows[0][0], Value::Int(1));
        assert_eq!(result.rows[0][2], Value::String("2.50".to_string()));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_introspect_schema() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let schema = client.introspect_schema().await.unwrap();
        for table in &schema.tables {
            assert!(!table.name.is_empty());
        }

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_query_with_error() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let error = client
            .execute_query("SELECT * FROM nonexistent_table_xyz")
            .await
            .unwrap_err();
        assert!(error.to_string().contains("nonexistent_table_xyz"));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let descriptor = ConnectionDescriptor::Postgres {
            host: "nonexistent.invalid".to_string(),
            port: 5432,
            database: "testdb".to_string(),
            username: "testuser".to_string(),
            secret: crate::connection::Secret::new("testpass"),
        };

        let error = PostgresClient::connect(&descriptor).await.unwrap_err();
        assert!(matches!(error, DbAskError::Connection(_)));
    }
}
