//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{DbAskError, Result};
use crate::llm::{LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig};

/// Creates an LLM client for the configured provider.
///
/// `api_key` is the key resolved at startup (see
/// [`Config::resolve_api_key`](crate::config::Config::resolve_api_key)).
/// Providers that require one fail with a configuration error without it.
pub fn create_client(config: &LlmConfig, api_key: Option<String>) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAi => {
            let key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                DbAskError::config("No API key configured. Set OPENAI_API_KEY.")
            })?;

            let mut openai = OpenAiConfig::new(key, config.model.clone())
                .with_temperature(config.temperature)
                .with_timeout(config.timeout_secs);
            if let Some(base_url) = &config.base_url {
                openai = openai.with_base_url(base_url.clone());
            }
            Ok(Arc::new(OpenAiClient::new(openai)?))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_client() {
        let config = LlmConfig {
            provider: LlmProvider::Mock,
            ..LlmConfig::default()
        };
        assert!(create_client(&config, None).is_ok());
    }

    #[test]
    fn test_create_openai_without_key_fails() {
        let result = create_client(&LlmConfig::default(), None);
        let err = result.err().unwrap();
        assert!(matches!(err, DbAskError::Config(_)));
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn test_create_openai_with_blank_key_fails() {
        assert!(create_client(&LlmConfig::default(), Some("  ".to_string())).is_err());
    }

    #[test]
    fn test_create_openai_with_provided_key() {
        let config = LlmConfig {
            base_url: Some("http://localhost:8080/v1".to_string()),
            ..LlmConfig::default()
        };
        assert!(create_client(&config, Some("test-key".to_string())).is_ok());
    }
}
