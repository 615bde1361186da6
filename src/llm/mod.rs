//! Language model providers
//!
//! Every workflow stage that needs generation goes through the
//! [`LanguageModel`] trait: one system prompt, one user prompt, one text
//! reply. Providers are constructed once at startup and borrowed by the
//! workflow for the lifetime of a request.

pub mod anthropic;
pub mod ollama;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmProvider};
use crate::errors::{AgentError, Result};

pub use anthropic::AnthropicClient;
pub use ollama::OllamaChatClient;

/// Single-shot text completion
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Model identifier for logs
    fn model_name(&self) -> &str;
}

/// Build the configured provider
pub fn from_config(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider {
        LlmProvider::Anthropic => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                AgentError::ConfigError("Anthropic provider requires an API key".to_string())
            })?;
            Ok(Box::new(AnthropicClient::new(config, api_key)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaChatClient::new(config)?)),
    }
}

/// Fail fast when a local provider is not serving.
///
/// Hosted providers are not probed; their credentials are checked by
/// `Config::validate_credentials`.
pub async fn ensure_available(config: &LlmConfig) -> Result<()> {
    match config.provider {
        LlmProvider::Anthropic => Ok(()),
        LlmProvider::Ollama => {
            let client = OllamaChatClient::new(config)?;
            if client.health_check().await {
                Ok(())
            } else {
                Err(AgentError::LlmError(format!(
                    "Ollama is not reachable at {}",
                    client.base_url()
                )))
            }
        }
    }
}
