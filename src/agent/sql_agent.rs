//! LLM-driven SQL agent.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::tools::{self, SqlToolkit};
use super::{prompt, Agent, AgentFactory};
use crate::db::DatabaseClient;
use crate::error::{DbAskError, Result};
use crate::llm::{LlmClient, Message, ToolDefinition};

/// Model round-trips allowed per question.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Answers questions by letting the model call database tools until it
/// produces a final answer.
pub struct SqlAgent {
    llm: Arc<dyn LlmClient>,
    toolkit: SqlToolkit,
    tools: Vec<ToolDefinition>,
    system_prompt: String,
    max_iterations: usize,
}

impl SqlAgent {
    /// Builds an agent for `db`. Fails when the tables cannot be listed.
    pub async fn new(
        llm: Arc<dyn LlmClient>,
        db: Arc<dyn DatabaseClient>,
        max_iterations: usize,
    ) -> Result<Self> {
        let backend = db.backend();
        let tables = db.introspect_schema().await?.table_names();
        info!(
            backend = %backend,
            tables = tables.len(),
            "SQL agent ready"
        );

        Ok(Self {
            llm,
            system_prompt: prompt::build_system_prompt(backend, &tables),
            toolkit: SqlToolkit::new(db),
            tools: tools::definitions(),
            max_iterations: max_iterations.max(1),
        })
    }

    /// The system prompt sent with every question.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

#[async_trait]
impl Agent for SqlAgent {
    async fn invoke(&self, question: &str) -> Result<String> {
        let start = Instant::now();
        let mut messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(question),
        ];

        for iteration in 1..=self.max_iterations {
            let response = self.llm.complete(&messages, &self.tools).await?;

            if !response.has_tool_calls() {
                let answer = response.content.trim();
                if answer.is_empty() {
                    return Err(DbAskError::llm("The model returned an empty answer"));
                }
                info!(
                    iterations = iteration,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Question answered"
                );
                return Ok(answer.to_string());
            }

            messages.push(Message::assistant_with_tools(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                debug!(iteration, tool = %call.name, "Running tool");
                let output = self.toolkit.run(call).await;
                messages.push(Message::tool_result(call.id.clone(), output));
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Agent stopped without a final answer"
        );
        Err(DbAskError::query(format!(
            "Agent stopped after {} steps without a final answer. Try a more specific question.",
            self.max_iterations
        )))
    }

    async fn shutdown(&self) -> Result<()> {
        self.toolkit.db().close().await
    }
}

/// Builds [`SqlAgent`]s that share one LLM client.
pub struct SqlAgentFactory {
    llm: Arc<dyn LlmClient>,
    max_iterations: usize,
}

impl SqlAgentFactory {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[async_trait]
impl AgentFactory for SqlAgentFactory {
    async fn create_agent(&self, db: Arc<dyn DatabaseClient>) -> Result<Box<dyn Agent>> {
        let agent = SqlAgent::new(Arc::clone(&self.llm), db, self.max_iterations).await?;
        Ok(Box::new(agent))
    }
}
