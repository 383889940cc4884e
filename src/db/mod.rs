//! Database abstraction layer for db-ask.
//!
//! Provides a trait-based interface for database operations so the SQL agent
//! can work against SQLite, PostgreSQL and SQL Server interchangeably.

mod mock;
mod mssql;
mod postgres;
mod schema;
mod sqlite;
mod types;

pub use mock::{FailingDatabaseClient, MockConnector, MockDatabaseClient};
pub use mssql::MssqlClient;
pub use postgres::PostgresClient;
pub use schema::{Column, ForeignKey, Schema, Table};
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, ResultSet, Row, Value};

use crate::connection::{BackendKind, ConnectionDescriptor};
use crate::error::Result;
use async_trait::async_trait;

/// Query timeout in seconds, shared by all backends.
pub(crate) const QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum rows a backend keeps from a single statement.
pub(crate) const MAX_ROWS: usize = 1000;

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with DbAskError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Which backend this client talks to.
    fn backend(&self) -> BackendKind;

    /// Introspects user tables, their columns and foreign keys.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Executes a SQL statement and returns its rows.
    async fn execute_query(&self, sql: &str) -> Result<ResultSet>;

    /// Closes the connection. Calling it twice is harmless.
    async fn close(&self) -> Result<()>;
}

/// Opens database handles for descriptors.
///
/// The session layer only ever talks to this seam, so tests can swap in a
/// connector that never touches a real server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a live handle to the database the descriptor names.
    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector backed by the real drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConnector;

#[async_trait]
impl Connector for DriverConnector {
    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        match descriptor {
            ConnectionDescriptor::Sqlite { path } => {
                Ok(Box::new(SqliteClient::connect(path).await?))
            }
            ConnectionDescriptor::Postgres { .. } => {
                Ok(Box::new(PostgresClient::connect(descriptor).await?))
            }
            ConnectionDescriptor::SqlServer { .. } => {
                Ok(Box::new(MssqlClient::connect(descriptor).await?))
            }
        }
    }
}

/// Quotes an identifier for the given backend's dialect.
pub fn quote_identifier(backend: BackendKind, name: &str) -> String {
    match backend {
        BackendKind::Sqlite | BackendKind::Postgres => {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
        BackendKind::SqlServer => format!("[{}]", name.replace(']', "]]")),
    }
}

/// Builds a statement selecting the first `limit` rows of `table`.
pub fn sample_rows_query(backend: BackendKind, table: &str, limit: usize) -> String {
    let table = quote_identifier(backend, table);
    match backend {
        BackendKind::SqlServer => format!("SELECT TOP {limit} * FROM {table}"),
        BackendKind::Sqlite | BackendKind::Postgres => {
            format!("SELECT * FROM {table} LIMIT {limit}")
        }
    }
}
