//! Mock database clients for testing.
//!
//! Lets the agent and session layers run without a real database server.

use super::{ColumnInfo, Connector, DatabaseClient, ResultSet, Schema, Value};
use crate::connection::{BackendKind, ConnectionDescriptor};
use crate::error::{DbAskError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A mock database client that answers from canned results.
///
/// Statements are matched by case-insensitive substring against the
/// registered responses, first match wins. Unmatched SELECTs return a single
/// `result` column; anything else returns an empty result.
pub struct MockDatabaseClient {
    backend: BackendKind,
    schema: Schema,
    responses: Vec<(String, std::result::Result<ResultSet, String>)>,
    executed: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty schema.
    pub fn new() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            schema: Schema::default(),
            responses: Vec::new(),
            executed: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets which backend the mock claims to be.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the schema returned by introspection.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Answers statements containing `pattern` with `result`.
    pub fn with_result(mut self, pattern: impl Into<String>, result: ResultSet) -> Self {
        self.responses.push((pattern.into().to_lowercase(), Ok(result)));
        self
    }

    /// Fails statements containing `pattern` with a query error.
    pub fn with_error(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses
            .push((pattern.into().to_lowercase(), Err(message.into())));
        self
    }

    /// Shared log of every statement executed so far.
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }

    /// Shared flag that flips once `close` has been called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<ResultSet> {
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }

        let lowered = sql.to_lowercase();
        if let Some((_, response)) = self
            .responses
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
        {
            return response.clone().map_err(DbAskError::query);
        }

        if lowered.trim_start().starts_with("select") {
            Ok(ResultSet::with_data(
                vec![ColumnInfo::new("result", "text")],
                vec![vec![Value::String(format!("Mock result for: {sql}"))]],
            ))
        } else {
            Ok(ResultSet::default())
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A database client whose every operation fails.
pub struct FailingDatabaseClient {
    message: String,
}

impl FailingDatabaseClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        Err(DbAskError::connection(self.message.clone()))
    }

    async fn execute_query(&self, _sql: &str) -> Result<ResultSet> {
        Err(DbAskError::connection(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Err(DbAskError::connection(self.message.clone()))
    }
}

/// Connector that hands out mock clients and counts what happened.
#[derive(Clone, Default)]
pub struct MockConnector {
    failure: Option<String>,
    schema: Schema,
    connects: Arc<AtomicUsize>,
    closes: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl MockConnector {
    /// A connector whose connections always succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose connections always fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Sets the schema every handed-out client reports.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Number of connect attempts made so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of handed-out clients that are still open.
    pub fn open_count(&self) -> usize {
        self.closes
            .lock()
            .map(|flags| flags.iter().filter(|f| !f.load(Ordering::SeqCst)).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(DbAskError::connection(message.clone()));
        }

        let client = MockDatabaseClient::new()
            .with_backend(descriptor.backend())
            .with_schema(self.schema.clone());
        if let Ok(mut flags) = self.closes.lock() {
            flags.push(client.closed_flag());
        }
        Ok(Box::new(client))
    }
}
