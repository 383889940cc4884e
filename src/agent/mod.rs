//! Query agents.
//!
//! An agent answers natural-language questions about one connected database.
//! The session layer only sees the [`Agent`] and [`AgentFactory`] traits; the
//! production implementation is [`SqlAgent`], an LLM tool-calling loop.

pub mod checker;
mod mock;
mod prompt;
mod sql_agent;
pub mod tools;

pub use mock::{StubAgent, StubAgentFactory};
pub use prompt::{build_system_prompt, dialect_name, TOP_K};
pub use sql_agent::{SqlAgent, SqlAgentFactory, DEFAULT_MAX_ITERATIONS};

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::DatabaseClient;
use crate::error::Result;

/// Answers questions about the database it was built for.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Runs one question to completion and returns the answer text.
    ///
    /// Every call is independent; nothing from earlier questions is kept.
    async fn invoke(&self, question: &str) -> Result<String>;

    /// Releases the agent's resources, including its database handle.
    async fn shutdown(&self) -> Result<()>;
}

/// Builds agents bound to an open database handle.
///
/// On failure the handle is left to the caller, who is responsible for
/// closing it.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create_agent(&self, db: Arc<dyn DatabaseClient>) -> Result<Box<dyn Agent>>;
}
