//! Question answering for db-ask.
//!
//! Forwards one natural-language question to the active session's agent and
//! reports the answer or the failure. Nothing is retried or cached.

use std::time::Instant;

use tracing::{info, warn};

use crate::session::{Session, SessionError, SessionManager};

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// The agent's answer text.
    Answer(String),
    /// Why the agent could not answer.
    Failure(String),
}

impl QueryResult {
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer(_))
    }

    /// The answer or failure text.
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Failure(text) => text,
        }
    }
}

/// Runs questions through session agents.
pub struct QueryRunner;

impl QueryRunner {
    /// Runs `question` through the session's agent.
    ///
    /// The session stays usable whatever the outcome.
    pub async fn ask(session: &Session, question: &str) -> QueryResult {
        let start = Instant::now();
        let result = session.agent().invoke(question).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(answer) => {
                info!(backend = %session.backend(), elapsed_ms, "Question answered");
                QueryResult::Answer(answer)
            }
            Err(e) => {
                warn!(
                    backend = %session.backend(),
                    elapsed_ms,
                    category = e.category(),
                    "Question failed"
                );
                QueryResult::Failure(e.to_string())
            }
        }
    }

    /// Runs `question` through the active session, if there is one.
    pub async fn ask_current(
        manager: &SessionManager,
        question: &str,
    ) -> Result<QueryResult, SessionError> {
        let session = manager
            .current_session()
            .ok_or(SessionError::NotConnected)?;
        Ok(Self::ask(session, question).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::StubAgentFactory;
    use crate::connection::{BackendKind, ConnectionDescriptor};
    use crate::db::MockConnector;
    use crate::session::SessionStatus;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sqlite() -> ConnectionDescriptor {
        ConnectionDescriptor::Sqlite {
            path: "data/todo_app.db".to_string(),
        }
    }

    fn manager(factory: &StubAgentFactory) -> SessionManager {
        SessionManager::new(Arc::new(MockConnector::new()), Arc::new(factory.clone()))
    }

    #[tokio::test]
    async fn test_answer_is_passed_through() {
        let factory = StubAgentFactory::answering("42");
        let mut manager = manager(&factory);
        let session = manager.connect(sqlite()).await.unwrap();

        let result = QueryRunner::ask(session, "What is the answer?").await;
        assert_eq!(result, QueryResult::Answer("42".to_string()));
        assert!(result.is_answer());
    }

    #[tokio::test]
    async fn test_failure_keeps_session_connected() {
        let factory = StubAgentFactory::failing_with("near \"SELEC\": syntax error");
        let mut manager = manager(&factory);
        manager.connect(sqlite()).await.unwrap();

        let result = QueryRunner::ask_current(&manager, "broken").await.unwrap();
        assert_eq!(
            result,
            QueryResult::Failure("Query error: near \"SELEC\": syntax error".to_string())
        );
        assert_eq!(manager.status(), SessionStatus::Connected(BackendKind::Sqlite));

        let result = QueryRunner::ask_current(&manager, "again").await.unwrap();
        assert!(!result.is_answer());
        assert_eq!(factory.invocations(), 2);
    }

    #[tokio::test]
    async fn test_ask_without_session_never_reaches_agent() {
        let factory = StubAgentFactory::answering("42");
        let manager = manager(&factory);

        let err = QueryRunner::ask_current(&manager, "anything").await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
        assert_eq!(factory.invocations(), 0);
    }

    #[tokio::test]
    async fn test_ask_after_disconnect_is_rejected() {
        let factory = StubAgentFactory::answering("42");
        let mut manager = manager(&factory);
        manager.connect(sqlite()).await.unwrap();
        manager.disconnect().await;

        let err = QueryRunner::ask_current(&manager, "anything").await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
        assert_eq!(factory.invocations(), 0);
    }

    #[test]
    fn test_result_text() {
        assert_eq!(QueryResult::Answer("a".into()).text(), "a");
        assert_eq!(QueryResult::Failure("f".into()).text(), "f");
    }
}
