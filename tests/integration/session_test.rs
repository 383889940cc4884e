//! Session lifecycle tests against real drivers.

use std::sync::Arc;

use db_ask::agent::SqlAgentFactory;
use db_ask::connection::{build_descriptor, BackendKind, ConnectionDescriptor, RawFields};
use db_ask::db::DriverConnector;
use db_ask::error::ConnectError;
use db_ask::llm::MockLlmClient;
use db_ask::session::{SessionManager, SessionStatus};
use pretty_assertions::assert_eq;

use super::seeded_sqlite;

fn manager() -> SessionManager {
    let factory = SqlAgentFactory::new(Arc::new(MockLlmClient::new()));
    SessionManager::new(Arc::new(DriverConnector), Arc::new(factory))
}

#[tokio::test]
async fn test_connect_and_disconnect_sqlite() {
    let (_dir, path) = seeded_sqlite().await;
    let mut manager = manager();

    let session = manager
        .connect(ConnectionDescriptor::Sqlite { path: path.clone() })
        .await
        .unwrap();
    assert_eq!(session.backend(), BackendKind::Sqlite);
    assert_eq!(session.label(), format!("SQLite: {path}"));
    assert_eq!(manager.status(), SessionStatus::Connected(BackendKind::Sqlite));

    manager.disconnect().await;
    assert_eq!(manager.status(), SessionStatus::Disconnected);
    assert!(manager.current_session().is_none());
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let (_dir, path) = seeded_sqlite().await;
    let mut manager = manager();

    manager
        .connect(ConnectionDescriptor::Sqlite { path: path.clone() })
        .await
        .unwrap();
    let err = manager
        .connect(ConnectionDescriptor::Sqlite { path })
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectError::AlreadyConnected(BackendKind::Sqlite)));
    assert!(manager.status().is_connected());
    manager.disconnect().await;
}

#[tokio::test(flavor = "current_thread")]
async fn test_unreachable_postgres_leaves_session_disconnected() {
    let fields = RawFields {
        host: "127.0.0.1".to_string(),
        port: "1".to_string(),
        database: "testdb".to_string(),
        username: "testuser".to_string(),
        secret: "testpass".to_string(),
        ..Default::default()
    };
    let descriptor = build_descriptor(BackendKind::Postgres, &fields).unwrap();
    let mut manager = manager();

    let err = manager.connect(descriptor).await.unwrap_err();

    let ConnectError::Failed { backend, .. } = &err else {
        panic!("expected a failed connect, got {err:?}");
    };
    assert_eq!(*backend, BackendKind::Postgres);
    assert!(err
        .troubleshooting()
        .unwrap()
        .contains("Check if PostgreSQL is running"));
    assert_eq!(manager.status(), SessionStatus::Disconnected);
}

#[tokio::test]
async fn test_unopenable_sqlite_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be opened as a database file.
    let path = dir.path().to_string_lossy().into_owned();
    let mut manager = manager();

    let result = manager.connect(ConnectionDescriptor::Sqlite { path }).await;

    assert!(result.is_err());
    assert_eq!(manager.status(), SessionStatus::Disconnected);
}
