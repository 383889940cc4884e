//! Error types for db-ask.
//!
//! `DbAskError` is the crate-wide error used by the database, LLM and agent
//! layers. `ConnectError` is what a failed connect attempt reports to the user.

use crate::connection::BackendKind;
use thiserror::Error;

/// Main error type for db-ask operations.
#[derive(Error, Debug)]
pub enum DbAskError {
    /// Database connection errors (host unreachable, auth failed, missing driver, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, permission errors, timeouts, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, missing credential, bad form field, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (terminal failures, unexpected states, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbAskError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using DbAskError.
pub type Result<T> = std::result::Result<T, DbAskError>;

/// Why a connect attempt did not produce a session.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// A session is already active; it must be disconnected explicitly first.
    #[error("Already connected to {0}. Disconnect before connecting again.")]
    AlreadyConnected(BackendKind),

    /// The backend could not be reached or the agent could not be built.
    #[error("Connection to {backend} failed: {reason}")]
    Failed { backend: BackendKind, reason: String },
}

impl ConnectError {
    /// Wraps an underlying error as a failed attempt against `backend`.
    pub fn failed(backend: BackendKind, source: &DbAskError) -> Self {
        Self::Failed {
            backend,
            reason: source.to_string(),
        }
    }

    /// Backend-specific remediation hint for failed attempts.
    pub fn troubleshooting(&self) -> Option<&'static str> {
        match self {
            Self::AlreadyConnected(_) => None,
            Self::Failed { backend, .. } => Some(backend.troubleshooting()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = DbAskError::connection("Cannot connect to localhost:5432");
        assert_eq!(
            err.to_string(),
            "Connection error: Cannot connect to localhost:5432"
        );
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_error_display_query() {
        let err = DbAskError::query("no such column: emal");
        assert_eq!(err.to_string(), "Query error: no such column: emal");
        assert_eq!(err.category(), "Query Error");
    }

    #[test]
    fn test_error_display_llm() {
        let err = DbAskError::llm("Rate limited. Please wait.");
        assert_eq!(err.to_string(), "LLM error: Rate limited. Please wait.");
        assert_eq!(err.category(), "LLM Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = DbAskError::config("OPENAI_API_KEY is not set");
        assert_eq!(
            err.to_string(),
            "Configuration error: OPENAI_API_KEY is not set"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_display_internal() {
        let err = DbAskError::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
        assert_eq!(err.category(), "Internal Error");
    }

    #[test]
    fn test_connect_error_failed_carries_guidance() {
        let err = ConnectError::failed(
            BackendKind::Postgres,
            &DbAskError::connection("connection refused"),
        );
        assert_eq!(
            err.to_string(),
            "Connection to PostgreSQL failed: Connection error: connection refused"
        );
        assert!(err.troubleshooting().unwrap().contains("PostgreSQL is running"));
    }

    #[test]
    fn test_already_connected_has_no_guidance() {
        let err = ConnectError::AlreadyConnected(BackendKind::Sqlite);
        assert!(err.to_string().contains("Disconnect before connecting again"));
        assert!(err.troubleshooting().is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DbAskError>();
        assert_send_sync::<ConnectError>();
    }
}
