//! Connection descriptors and URI rendering.
//!
//! A descriptor is built fresh from the form fields for every connect attempt
//! and rendered into the single connection URI handed to the drivers.

use std::fmt;
use std::net::Ipv6Addr;

use url::{Host, Url};

use super::BackendKind;
use crate::error::{DbAskError, Result};

/// Default SQLite database file, relative to the working directory.
pub const DEFAULT_SQLITE_PATH: &str = "data/todo_app.db";

/// Default host for server backends.
pub const DEFAULT_HOST: &str = "localhost";

/// Default database name for server backends.
pub const DEFAULT_DATABASE: &str = "your_db";

/// ODBC driver requested for SQL Server connections.
pub const MSSQL_ODBC_DRIVER: &str = "ODBC Driver 17 for SQL Server";

/// A password that stays out of logs and debug output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret in clear text.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Raw connection form fields, exactly as typed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    pub path: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for RawFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFields")
            .field("path", &self.path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

impl RawFields {
    /// Form defaults for a backend, as first shown to the user.
    pub fn defaults_for(kind: BackendKind) -> Self {
        Self {
            path: DEFAULT_SQLITE_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: match kind {
                BackendKind::Postgres => "5432".to_string(),
                _ => String::new(),
            },
            database: DEFAULT_DATABASE.to_string(),
            username: String::new(),
            secret: String::new(),
        }
    }

    /// Fills empty Postgres fields from the libpq environment variables.
    pub fn apply_pg_env_defaults(&mut self) {
        self.apply_pg_env_defaults_from(|var| std::env::var(var).ok());
    }

    /// Same as [`RawFields::apply_pg_env_defaults`] with an explicit lookup.
    pub fn apply_pg_env_defaults_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |field: &mut String, var: &str| {
            if field.trim().is_empty() {
                if let Some(value) = lookup(var) {
                    *field = value;
                }
            }
        };
        fill(&mut self.host, "PGHOST");
        fill(&mut self.port, "PGPORT");
        fill(&mut self.database, "PGDATABASE");
        fill(&mut self.username, "PGUSER");
        fill(&mut self.secret, "PGPASSWORD");
    }

    /// Splits a connection URI into form fields.
    ///
    /// Parts the URI leaves out stay empty, so lower-precedence sources
    /// (libpq variables, form defaults) can still fill them.
    pub fn from_uri(uri: &str) -> Result<(BackendKind, Self)> {
        let decode = |s: &str| {
            urlencoding::decode(s)
                .map(|c| c.into_owned())
                .map_err(invalid_uri)
        };

        let uri = uri.trim();
        let sqlite_prefix = format!("{}:", BackendKind::Sqlite.url_scheme());
        if let Some(rest) = uri.strip_prefix(sqlite_prefix.as_str()) {
            let rest = rest.strip_prefix("//").unwrap_or(rest);
            let path = rest.split(['?', '#']).next().unwrap_or_default();
            if path.is_empty() {
                return Err(DbAskError::config("SQLite URI is missing a file path"));
            }
            let fields = Self {
                path: decode(path)?,
                ..Self::default()
            };
            return Ok((BackendKind::Sqlite, fields));
        }

        let url = Url::parse(uri).map_err(invalid_uri)?;
        let kind = match BackendKind::parse(url.scheme()) {
            Some(kind @ (BackendKind::Postgres | BackendKind::SqlServer)) => kind,
            _ => {
                return Err(DbAskError::config(format!(
                    "Invalid scheme '{}'. Expected 'sqlite', 'postgres' or 'mssql'",
                    url.scheme()
                )))
            }
        };

        let host = match url.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => decode(&host.to_string())?,
            None => String::new(),
        };
        let fields = Self {
            path: String::new(),
            host,
            port: url.port().map(|p| p.to_string()).unwrap_or_default(),
            database: decode(url.path().trim_start_matches('/'))?,
            username: decode(url.username())?,
            secret: decode(url.password().unwrap_or_default())?,
        };
        Ok((kind, fields))
    }
}

fn invalid_uri(e: impl fmt::Display) -> DbAskError {
    DbAskError::config(format!("Invalid connection string: {e}"))
}

/// How to reach one database instance. Exactly one backend is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    Sqlite {
        path: String,
    },
    Postgres {
        host: String,
        port: u16,
        database: String,
        username: String,
        secret: Secret,
    },
    SqlServer {
        host: String,
        database: String,
        username: String,
        secret: Secret,
    },
}

/// Builds a descriptor from raw form fields.
///
/// Only type coercion happens here (the port must be an integer in
/// `1..=65535` and the host must not carry URI delimiters); whether the
/// target is reachable is left to the connect attempt. Fields the chosen backend does not use are ignored.
pub fn build_descriptor(kind: BackendKind, fields: &RawFields) -> Result<ConnectionDescriptor> {
    let or_default = |value: &str, default: &str| {
        let value = value.trim();
        if value.is_empty() {
            default.to_string()
        } else {
            value.to_string()
        }
    };

    match kind {
        BackendKind::Sqlite => Ok(ConnectionDescriptor::Sqlite {
            path: or_default(&fields.path, DEFAULT_SQLITE_PATH),
        }),
        BackendKind::Postgres => Ok(ConnectionDescriptor::Postgres {
            host: parse_host(&or_default(&fields.host, DEFAULT_HOST))?,
            port: parse_port(&fields.port, 5432)?,
            database: or_default(&fields.database, DEFAULT_DATABASE),
            username: fields.username.trim().to_string(),
            secret: Secret::new(fields.secret.clone()),
        }),
        BackendKind::SqlServer => Ok(ConnectionDescriptor::SqlServer {
            host: parse_host(&or_default(&fields.host, DEFAULT_HOST))?,
            database: or_default(&fields.database, DEFAULT_DATABASE),
            username: fields.username.trim().to_string(),
            secret: Secret::new(fields.secret.clone()),
        }),
    }
}

/// Checks that a host stays inside the authority part of the URI.
///
/// A bracketed IPv6 literal is stored without its brackets.
fn parse_host(raw: &str) -> Result<String> {
    if let Some(inner) = raw.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        if inner.parse::<Ipv6Addr>().is_ok() {
            return Ok(inner.to_string());
        }
    }
    if raw.contains(['/', '@', '?', '#']) || raw.contains(char::is_whitespace) {
        return Err(DbAskError::config(format!(
            "Host must be a host name or address, got '{raw}'"
        )));
    }
    Ok(raw.to_string())
}

fn parse_port(raw: &str, default: u16) -> Result<u16> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    let port: u32 = raw
        .parse()
        .map_err(|_| DbAskError::config(format!("Port must be a number, got '{raw}'")))?;
    match u16::try_from(port) {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(DbAskError::config(format!(
            "Port must be between 1 and 65535, got {port}"
        ))),
    }
}

/// Renders the connection URI for a descriptor.
///
/// Pure: identical descriptors always render identical strings.
pub fn render_uri(descriptor: &ConnectionDescriptor) -> String {
    let scheme = descriptor.backend().url_scheme();
    match descriptor {
        ConnectionDescriptor::Sqlite { path } => {
            format!("{scheme}://{}?mode=rwc", escape_path(path))
        }
        ConnectionDescriptor::Postgres {
            host,
            port,
            database,
            username,
            secret,
        } => format!(
            "{scheme}://{}{}:{port}/{}",
            userinfo(username, secret),
            uri_host(host),
            urlencoding::encode(database)
        ),
        ConnectionDescriptor::SqlServer {
            host,
            database,
            username,
            secret,
        } => format!(
            "{scheme}://{}{}/{}?driver={}",
            userinfo(username, secret),
            uri_host(host),
            urlencoding::encode(database),
            MSSQL_ODBC_DRIVER.replace(' ', "+")
        ),
    }
}

/// Escapes the characters that would end the path part of a SQLite URI.
fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '?' => escaped.push_str("%3F"),
            '#' => escaped.push_str("%23"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn uri_host(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

fn userinfo(username: &str, secret: &Secret) -> String {
    if username.is_empty() {
        return String::new();
    }
    let mut info = urlencoding::encode(username).into_owned();
    if !secret.is_empty() {
        info.push(':');
        info.push_str(&urlencoding::encode(secret.expose()));
    }
    info.push('@');
    info
}

impl ConnectionDescriptor {
    /// The backend this descriptor targets.
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::Sqlite { .. } => BackendKind::Sqlite,
            Self::Postgres { .. } => BackendKind::Postgres,
            Self::SqlServer { .. } => BackendKind::SqlServer,
        }
    }

    /// Parses a connection URI in any of the forms `render_uri` produces.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let (kind, fields) = RawFields::from_uri(uri)?;
        build_descriptor(kind, &fields)
    }

    /// Returns a display-safe string (no password) for UI purposes.
    pub fn label(&self) -> String {
        match self {
            Self::Sqlite { path } => format!("SQLite: {path}"),
            Self::Postgres {
                host,
                port,
                database,
                ..
            } => format!("PostgreSQL: {database} @ {host}:{port}"),
            Self::SqlServer { host, database, .. } => format!("MSSQL: {database} @ {host}"),
        }
    }
}
