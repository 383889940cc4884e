//! Stub agents for testing the session layer without a model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Agent, AgentFactory};
use crate::db::DatabaseClient;
use crate::error::{DbAskError, Result};

/// An agent that always gives the same reply.
pub struct StubAgent {
    reply: std::result::Result<String, String>,
    db: Arc<dyn DatabaseClient>,
    invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Agent for StubAgent {
    async fn invoke(&self, _question: &str) -> Result<String> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(DbAskError::query)
    }

    async fn shutdown(&self) -> Result<()> {
        self.db.close().await
    }
}

/// Factory handing out [`StubAgent`]s.
#[derive(Clone)]
pub struct StubAgentFactory {
    reply: std::result::Result<String, String>,
    construction_error: Option<String>,
    invocations: Arc<AtomicUsize>,
}

impl StubAgentFactory {
    /// Agents that answer every question with `answer`.
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            reply: Ok(answer.into()),
            construction_error: None,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Agents that fail every question with a query error.
    pub fn failing_with(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            ..Self::answering("")
        }
    }

    /// A factory that cannot build agents at all.
    pub fn unbuildable(message: impl Into<String>) -> Self {
        Self {
            construction_error: Some(message.into()),
            ..Self::answering("")
        }
    }

    /// Questions answered by all agents from this factory.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentFactory for StubAgentFactory {
    async fn create_agent(&self, db: Arc<dyn DatabaseClient>) -> Result<Box<dyn Agent>> {
        if let Some(message) = &self.construction_error {
            return Err(DbAskError::llm(message.clone()));
        }
        Ok(Box::new(StubAgent {
            reply: self.reply.clone(),
            db,
            invocations: Arc::clone(&self.invocations),
        }))
    }
}
