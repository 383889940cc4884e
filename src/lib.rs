//! db-ask - Ask natural-language questions about a SQL database.
//!
//! This library exposes the core modules for the `dbask` binary and the
//! integration tests.

pub mod agent;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod query;
pub mod session;
pub mod tui;
