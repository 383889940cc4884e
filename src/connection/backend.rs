//! Supported database backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which relational database technology a connection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A local database file.
    #[default]
    Sqlite,
    /// A PostgreSQL server.
    #[serde(alias = "postgresql")]
    Postgres,
    /// A SQL Server compatible engine.
    #[serde(rename = "mssql", alias = "sqlserver")]
    SqlServer,
}

impl BackendKind {
    /// All backends in form order.
    pub const ALL: [BackendKind; 3] = [Self::Sqlite, Self::Postgres, Self::SqlServer];

    /// Returns the backend as a lowercase identifier (config files, CLI).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::SqlServer => "mssql",
        }
    }

    /// Returns the name shown to users.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite",
            Self::Postgres => "PostgreSQL",
            Self::SqlServer => "MSSQL",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "mssql" | "sqlserver" | "sql-server" => Some(Self::SqlServer),
            _ => None,
        }
    }

    /// Returns the default TCP port, if the backend uses one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Sqlite => None,
            Self::Postgres => Some(5432),
            Self::SqlServer => Some(1433),
        }
    }

    /// Returns the URL scheme used when rendering connection URIs.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::SqlServer => "mssql",
        }
    }

    /// The next backend in form order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Sqlite => Self::Postgres,
            Self::Postgres => Self::SqlServer,
            Self::SqlServer => Self::Sqlite,
        }
    }

    /// The previous backend in form order, wrapping around.
    pub fn prev(self) -> Self {
        match self {
            Self::Sqlite => Self::SqlServer,
            Self::Postgres => Self::Sqlite,
            Self::SqlServer => Self::Postgres,
        }
    }

    /// Short hint shown below the connection form.
    pub fn form_hint(&self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite file will be created if it doesn't exist",
            Self::Postgres => "Make sure PostgreSQL is running and accessible",
            Self::SqlServer => "Make sure SQL Server is running and accepts TCP connections",
        }
    }

    /// Remediation hint shown after a failed connect attempt.
    pub fn troubleshooting(&self) -> &'static str {
        match self {
            Self::Sqlite => "Check if the file path is correct and writable",
            Self::Postgres => {
                "Check if PostgreSQL is running, credentials are correct, \
                 and the server accepts TCP connections"
            }
            Self::SqlServer => {
                "Check if SQL Server is running, credentials are correct, \
                 and TCP/IP is enabled on port 1433"
            }
        }
    }

    /// Illustrative questions shown while no session is active.
    pub fn example_questions(&self) -> &'static [&'static str] {
        match self {
            Self::Sqlite => &[
                "What tables are in this database?",
                "Show me the schema for the users table",
                "How many todos does each user have?",
                "What are the top 5 high priority tasks?",
                "Show me all completed todos",
                "Which user has the most pending tasks?",
            ],
            Self::Postgres => &[
                "What tables are in this database?",
                "Show me the schema for the users table",
                "How many records are in the todos table?",
                "What are the top 5 users by todo count?",
                "Show me all columns in the categories table",
            ],
            Self::SqlServer => &[
                "What tables are in this database?",
                "Show me the schema for the Users table",
                "How many records are in the Todos table?",
                "What are the top 5 users by todo count?",
                "Show me all columns in the Categories table",
            ],
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("Unknown database backend: {s}. Expected: sqlite, postgres, or mssql")
        })
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
