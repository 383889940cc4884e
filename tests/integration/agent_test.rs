//! End-to-end question answering over SQLite with a scripted model.

use std::sync::Arc;

use db_ask::agent::{tools, SqlAgentFactory};
use db_ask::connection::ConnectionDescriptor;
use db_ask::db::{DatabaseClient, DriverConnector, SqliteClient};
use db_ask::llm::{LlmResponse, MockLlmClient, Role};
use db_ask::query::{QueryResult, QueryRunner};
use db_ask::session::SessionManager;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::seeded_sqlite;

async fn connected(llm: &MockLlmClient, path: &str, max_iterations: usize) -> SessionManager {
    let factory =
        SqlAgentFactory::new(Arc::new(llm.clone())).with_max_iterations(max_iterations);
    let mut manager = SessionManager::new(Arc::new(DriverConnector), Arc::new(factory));
    manager
        .connect(ConnectionDescriptor::Sqlite {
            path: path.to_string(),
        })
        .await
        .unwrap();
    manager
}

#[tokio::test]
async fn test_question_walks_the_tools() {
    let (_dir, path) = seeded_sqlite().await;
    let llm = MockLlmClient::new()
        .with_tool_call(tools::LIST_TABLES, json!({}))
        .with_tool_call(tools::SCHEMA, json!({ "table_names": "users" }))
        .with_tool_call(tools::QUERY, json!({ "query": "SELECT COUNT(*) AS n FROM users" }))
        .with_response(LlmResponse::text("There are 3 users."));
    let mut manager = connected(&llm, &path, 15).await;

    let result = QueryRunner::ask_current(&manager, "How many users are there?")
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Answer("There are 3 users.".to_string()));

    let requests = llm.requests();
    assert_eq!(requests.len(), 4);

    let system = &requests[0][0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("SQLite"));
    assert!(system.content.contains("todos, users"));

    let tool_output = |i: usize| requests[i].last().unwrap().content.clone();
    assert_eq!(tool_output(1), "todos, users");
    assert!(tool_output(2).contains("CREATE TABLE users"));
    assert!(tool_output(2).contains("3 rows from users table:"));
    assert_eq!(tool_output(3), "n\n3");

    manager.disconnect().await;
}

#[tokio::test]
async fn test_write_statements_are_refused() {
    let (_dir, path) = seeded_sqlite().await;
    let llm = MockLlmClient::new()
        .with_tool_call(tools::QUERY, json!({ "query": "DROP TABLE users" }))
        .with_response(LlmResponse::text("I am not allowed to drop tables."));
    let mut manager = connected(&llm, &path, 15).await;

    let result = QueryRunner::ask_current(&manager, "Drop the users table")
        .await
        .unwrap();
    assert!(result.is_answer());

    let requests = llm.requests();
    let refusal = &requests[1].last().unwrap().content;
    assert!(refusal.starts_with("Error: DROP statements are not allowed"));

    manager.disconnect().await;

    let client = SqliteClient::connect(&path).await.unwrap();
    let count = client
        .execute_query("SELECT COUNT(*) FROM users")
        .await
        .unwrap();
    assert_eq!(count.row_count, 1);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_database_errors_reach_the_model() {
    let (_dir, path) = seeded_sqlite().await;
    let llm = MockLlmClient::new()
        .with_tool_call(tools::QUERY, json!({ "query": "SELECT * FROM missing_table" }))
        .with_response(LlmResponse::text("That table does not exist."));
    let mut manager = connected(&llm, &path, 15).await;

    let result = QueryRunner::ask_current(&manager, "What is in missing_table?")
        .await
        .unwrap();
    assert_eq!(
        result,
        QueryResult::Answer("That table does not exist.".to_string())
    );

    let requests = llm.requests();
    let tool_output = &requests[1].last().unwrap().content;
    assert!(tool_output.starts_with("Error:"));
    assert!(tool_output.contains("missing_table"));

    manager.disconnect().await;
}

#[tokio::test]
async fn test_step_limit_fails_the_question_not_the_session() {
    let (_dir, path) = seeded_sqlite().await;
    let llm = MockLlmClient::new()
        .with_tool_call(tools::LIST_TABLES, json!({}))
        .with_tool_call(tools::LIST_TABLES, json!({}))
        .with_tool_call(tools::LIST_TABLES, json!({}))
        .with_response(LlmResponse::text("The users table has 3 rows."));
    let mut manager = connected(&llm, &path, 2).await;

    let first = QueryRunner::ask_current(&manager, "Keep looking").await.unwrap();
    assert_eq!(
        first,
        QueryResult::Failure(
            "Query error: Agent stopped after 2 steps without a final answer. \
             Try a more specific question."
                .to_string()
        )
    );
    assert!(manager.status().is_connected());

    // Each question starts a fresh conversation.
    let second = QueryRunner::ask_current(&manager, "How many users?")
        .await
        .unwrap();
    assert!(second.is_answer());
    let last_request = llm.requests().pop().unwrap();
    assert_eq!(last_request[1].content, "How many users?");
    assert_eq!(
        last_request
            .iter()
            .filter(|m| m.role == Role::User)
            .count(),
        1
    );

    manager.disconnect().await;
}
