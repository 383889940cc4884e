//! Mock LLM client for testing.
//!
//! Replays scripted turns in order. Once the script runs out it falls back to
//! a fixed routine: list the tables, then answer with whatever the last tool
//! returned. That fallback is what `--llm mock` shows interactively.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{DbAskError, Result};
use crate::llm::types::{LlmResponse, Message, Role, ToolCall, ToolDefinition};
use crate::llm::LlmClient;

/// Mock LLM client that returns scripted responses.
///
/// Used for unit testing without making real API calls.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    script: Arc<Mutex<VecDeque<std::result::Result<LlmResponse, String>>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLlmClient {
    /// Creates a new mock client with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn to the script.
    pub fn with_response(self, response: LlmResponse) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(response));
        }
        self
    }

    /// Appends a turn requesting a single tool call.
    pub fn with_tool_call(self, name: &str, arguments: serde_json::Value) -> Self {
        let id = format!("call_{}", self.scripted_len());
        self.with_response(LlmResponse::with_tool_calls(
            "",
            vec![ToolCall::new(id, name, arguments.to_string())],
        ))
    }

    /// Appends a turn that fails with an LLM error.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(message.into()));
        }
        self
    }

    /// Every message list the client has been called with, in order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn scripted_len(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn fallback(messages: &[Message], tools: &[ToolDefinition]) -> LlmResponse {
        if let Some(last) = messages.last().filter(|m| m.role == Role::Tool) {
            return LlmResponse::text(format!("(mock) {}", last.content));
        }
        if tools.iter().any(|t| t.name == "sql_db_list_tables") {
            return LlmResponse::with_tool_calls(
                "",
                vec![ToolCall::new("call_mock", "sql_db_list_tables", "{}")],
            );
        }
        let question = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        LlmResponse::text(format!("(mock) You asked: {question}"))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(DbAskError::llm(message)),
            None => Ok(Self::fallback(messages, tools)),
        }
    }
}
