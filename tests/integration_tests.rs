//! Integration tests for db-ask.
//!
//! SQLite tests run against temporary database files. PostgreSQL tests only
//! check failure paths and never need a running server.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
