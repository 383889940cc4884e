//! Connection integration tests.
//!
//! Tests descriptor handling and real driver connects.

use db_ask::connection::{build_descriptor, render_uri, BackendKind, RawFields};
use db_ask::db::{Connector, DatabaseClient, DriverConnector};
use pretty_assertions::assert_eq;

#[test]
fn test_form_to_postgres_uri() {
    let fields = RawFields {
        host: "localhost".to_string(),
        port: "5432".to_string(),
        database: "your_db".to_string(),
        username: "u".to_string(),
        secret: "p".to_string(),
        ..Default::default()
    };

    let descriptor = build_descriptor(BackendKind::Postgres, &fields).unwrap();
    assert_eq!(render_uri(&descriptor), "postgres://u:p@localhost:5432/your_db");
    assert!(!descriptor.label().contains(":p@"));
}

#[test]
fn test_bad_port_is_rejected_before_connecting() {
    let fields = RawFields {
        port: "abc".to_string(),
        ..RawFields::defaults_for(BackendKind::Postgres)
    };

    let err = build_descriptor(BackendKind::Postgres, &fields).unwrap_err();
    assert!(err.to_string().contains("Port must be a number"));
}

#[tokio::test]
async fn test_sqlite_file_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("new.db");
    let fields = RawFields {
        path: path.to_string_lossy().into_owned(),
        ..Default::default()
    };

    let descriptor = build_descriptor(BackendKind::Sqlite, &fields).unwrap();
    let client = DriverConnector.open(&descriptor).await.unwrap();

    assert_eq!(client.backend(), BackendKind::Sqlite);
    assert!(path.exists());
    client.close().await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn test_postgres_connection_refused() {
    let fields = RawFields {
        host: "127.0.0.1".to_string(),
        port: "1".to_string(),
        database: "testdb".to_string(),
        username: "testuser".to_string(),
        secret: "testpass".to_string(),
        ..Default::default()
    };

    let descriptor = build_descriptor(BackendKind::Postgres, &fields).unwrap();
    let result = DriverConnector.open(&descriptor).await;

    let Err(error) = result else {
        panic!("connecting to port 1 should fail");
    };
    assert!(
        !error.to_string().contains("testpass"),
        "error leaks the password: {error}"
    );
}
