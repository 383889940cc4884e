//! Connection configuration for db-ask.
//!
//! Turns backend-specific form fields into a normalized connection descriptor
//! and renders it into the URI the database drivers consume.

mod backend;
mod descriptor;

pub use backend::BackendKind;
pub use descriptor::{
    build_descriptor, render_uri, ConnectionDescriptor, RawFields, Secret, DEFAULT_DATABASE,
    DEFAULT_HOST, DEFAULT_SQLITE_PATH, MSSQL_ODBC_DRIVER,
};
