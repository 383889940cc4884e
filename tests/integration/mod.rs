//! Integration tests for db-ask.

pub mod agent_test;
pub mod connection_test;
pub mod session_test;

use db_ask::db::{DatabaseClient, SqliteClient};
use tempfile::TempDir;

/// Creates a SQLite database with a small todo schema and returns its path.
///
/// The directory must outlive the test.
pub async fn seeded_sqlite() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todo_app.db").to_string_lossy().into_owned();

    let client = SqliteClient::connect(&path).await.unwrap();
    for sql in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE todos (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id), \
         title TEXT NOT NULL, done INTEGER NOT NULL DEFAULT 0)",
        "INSERT INTO users (name) VALUES ('alice'), ('bob'), ('carol')",
        "INSERT INTO todos (user_id, title, done) VALUES (1, 'write docs', 1), \
         (1, 'review PR', 0), (2, 'ship it', 0)",
    ] {
        client.execute_query(sql).await.unwrap();
    }
    client.close().await.unwrap();

    (dir, path)
}
