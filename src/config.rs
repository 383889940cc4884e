//! Configuration management for db-ask.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for saved connection profiles and LLM provider settings.

use crate::connection::{BackendKind, RawFields};
use crate::error::{DbAskError, Result};
use crate::llm::LlmProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure for db-ask.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Saved connection profiles, keyed by name.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionProfile>,
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider: "openai" or "mock".
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name (e.g., "gpt-4", "gpt-4o-mini").
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,

    /// Agent steps allowed per question before giving up.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Alternative OpenAI-compatible endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key, used only when `OPENAI_API_KEY` is unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_iterations() -> usize {
    15
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            temperature: 0.0,
            max_iterations: default_max_iterations(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_iterations", &self.max_iterations)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A saved connection. Pre-fills the connection form, never connects by itself.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Which backend the profile targets.
    pub backend: BackendKind,

    /// SQLite database file.
    pub path: Option<String>,

    /// Server host.
    pub host: Option<String>,

    /// Server port (PostgreSQL only).
    pub port: Option<u16>,

    /// Database name.
    pub database: Option<String>,

    /// Login name.
    pub username: Option<String>,

    /// Password (not recommended to store in config).
    pub password: Option<String>,
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("backend", &self.backend)
            .field("path", &self.path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ConnectionProfile {
    /// Overwrites the fields the profile sets and leaves the rest alone.
    pub fn apply_to(&self, fields: &mut RawFields) {
        let set = |field: &mut String, value: &Option<String>| {
            if let Some(value) = value {
                *field = value.clone();
            }
        };
        set(&mut fields.path, &self.path);
        set(&mut fields.host, &self.host);
        set(&mut fields.database, &self.database);
        set(&mut fields.username, &self.username);
        set(&mut fields.secret, &self.password);
        if let Some(port) = self.port {
            fields.port = port.to_string();
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-ask")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DbAskError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            DbAskError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionProfile> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }

    /// Applies `OPENAI_MODEL`, `OPENAI_BASE_URL` and `DB_ASK_LLM` from the
    /// process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::apply_env_overrides`] with an explicit lookup.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OPENAI_MODEL").filter(|v| !v.trim().is_empty()) {
            self.llm.model = model;
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.llm.base_url = Some(base_url);
        }
        if let Some(provider) = lookup("DB_ASK_LLM").filter(|v| !v.trim().is_empty()) {
            self.llm.provider = provider
                .parse()
                .map_err(|e: String| DbAskError::config(format!("DB_ASK_LLM: {e}")))?;
        }
        Ok(())
    }

    /// Resolves the LLM API key from the process environment.
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        self.resolve_api_key_from(|key| std::env::var(key).ok())
    }

    /// Resolves the LLM API key: `OPENAI_API_KEY` first, then `llm.api_key`.
    ///
    /// Returns `Ok(None)` for providers that need no key.
    pub fn resolve_api_key_from<F>(&self, lookup: F) -> Result<Option<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.llm.provider.requires_api_key() {
            return Ok(None);
        }

        lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.llm.api_key.clone().filter(|k| !k.trim().is_empty()))
            .map(Some)
            .ok_or_else(|| {
                DbAskError::config(
                    "OPENAI_API_KEY is not set. Export it, add it to a .env file, \
                     or set llm.api_key in the config file.",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
[llm]
provider = "mock"
model = "gpt-4o-mini"
max_iterations = 5

[connections.default]
backend = "sqlite"
path = "data/todo_app.db"

[connections.prod]
backend = "postgres"
host = "db.example.com"
port = 5432
database = "app"
username = "readonly"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Mock);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_iterations, 5);
        assert_eq!(config.llm.timeout_secs, 60);

        let default_conn = config.connections.get("default").unwrap();
        assert_eq!(default_conn.backend, BackendKind::Sqlite);
        assert_eq!(default_conn.path.as_deref(), Some("data/todo_app.db"));

        let prod_conn = config.connections.get("prod").unwrap();
        assert_eq!(prod_conn.backend, BackendKind::Postgres);
        assert_eq!(prod_conn.port, Some(5432));
    }

    #[test]
    fn test_default_llm_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.max_iterations, 15);
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_backend_aliases_in_profiles() {
        let toml = r#"
[connections.warehouse]
backend = "sqlserver"
host = "sql01"
database = "Sales"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let conn = config.get_connection(Some("warehouse")).unwrap();
        assert_eq!(conn.backend, BackendKind::SqlServer);
    }

    #[test]
    fn test_unknown_backend_is_a_config_error() {
        let path = Path::new("config.toml");
        let err = Config::parse_toml("[connections.x]\nbackend = \"oracle\"\n", path).unwrap_err();
        assert!(matches!(err, DbAskError::Config(_)));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.llm.model, "gpt-4");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nmodel = \"gpt-4o\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_get_connection() {
        let toml = r#"
[connections.default]
backend = "sqlite"
path = "default.db"

[connections.prod]
backend = "postgres"
database = "prod_db"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let default = config.get_connection(None).unwrap();
        assert_eq!(default.path.as_deref(), Some("default.db"));

        let prod = config.get_connection(Some("prod")).unwrap();
        assert_eq!(prod.database.as_deref(), Some("prod_db"));

        assert!(config.get_connection(Some("nonexistent")).is_none());
    }

    #[test]
    fn test_profile_applies_only_what_it_sets() {
        let profile = ConnectionProfile {
            backend: BackendKind::Postgres,
            path: None,
            host: Some("db.example.com".to_string()),
            port: None,
            database: None,
            username: Some("readonly".to_string()),
            password: None,
        };

        let mut fields = RawFields::defaults_for(BackendKind::Postgres);
        profile.apply_to(&mut fields);
        assert_eq!(fields.host, "db.example.com");
        assert_eq!(fields.port, "5432");
        assert_eq!(fields.database, "your_db");
        assert_eq!(fields.username, "readonly");
        assert_eq!(fields.secret, "");
    }

    #[test]
    fn test_profile_debug_hides_password() {
        let profile = ConnectionProfile {
            backend: BackendKind::SqlServer,
            path: None,
            host: None,
            port: None,
            database: None,
            username: Some("sa".to_string()),
            password: Some("hunter2".to_string()),
        };
        let debug = format!("{profile:?}");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides_from(env(&[
                ("OPENAI_MODEL", "gpt-4o-mini"),
                ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
                ("DB_ASK_LLM", "mock"),
            ]))
            .unwrap();

        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(
            config.llm.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
        assert_eq!(config.llm.provider, LlmProvider::Mock);
    }

    #[test]
    fn test_env_override_rejects_unknown_provider() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides_from(env(&[("DB_ASK_LLM", "gemini")]))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }

    #[test]
    fn test_api_key_prefers_environment() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-file".to_string());

        let key = config
            .resolve_api_key_from(env(&[("OPENAI_API_KEY", "sk-env")]))
            .unwrap();
        assert_eq!(key.as_deref(), Some("sk-env"));

        let key = config.resolve_api_key_from(env(&[])).unwrap();
        assert_eq!(key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config::default();
        let err = config.resolve_api_key_from(env(&[])).unwrap_err();
        assert!(matches!(err, DbAskError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_mock_provider_needs_no_key() {
        let mut config = Config::default();
        config.llm.provider = LlmProvider::Mock;
        assert_eq!(config.resolve_api_key_from(env(&[])).unwrap(), None);
    }
}
