//! Configuration management for FedQuery
//!
//! TOML-based configuration with defaults, environment overrides and
//! validation. Location: ~/.fedquery/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AgentError, Result};
use crate::rag::confidence::ConfidenceThresholds;
use crate::types::MAX_TOP_K_HINT;

/// Environment variable holding the Anthropic credential
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Hard ceiling on reformulation retries per request
pub const MAX_REFORMULATION_LIMIT: u32 = 2;

/// Complete configuration for FedQuery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub retrieval: RetrievalConfig,
    pub confidence: ConfidenceThresholds,
    pub workflow: WorkflowSettings,
}

/// Supported language model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "anthropic" => Some(LlmProvider::Anthropic),
            "ollama" => Some(LlmProvider::Ollama),
            _ => None,
        }
    }
}

/// Language model connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    /// Provider default when unset
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// Read from the environment only, never persisted
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// Corpus server (MCP over stdio) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub server_command: String,
    pub server_args: Vec<String>,
    pub timeout_secs: u64,
}

/// Retrieval sizing and reranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub reranker_enabled: bool,
    /// Over-fetch multiplier applied before reranking
    pub overfetch_factor: usize,
}

/// Workflow bounds and presentation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub max_reformulations: u32,
    pub excerpt_chars: usize,
    pub preview_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: "claude-sonnet-4-5-20250929".to_string(),
            base_url: None,
            timeout_secs: 60,
            max_tokens: 1024,
            api_key: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            server_command: "python".to_string(),
            server_args: vec!["-m".to_string(), "src.mcp_server.server".to_string()],
            timeout_secs: 30,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            reranker_enabled: false,
            overfetch_factor: 3,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_reformulations: MAX_REFORMULATION_LIMIT,
            excerpt_chars: 200,
            preview_chars: 100,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from file or use defaults, then apply env overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::load_from_file(&config_path)?,
            None => Self::load_default()?,
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load from ~/.fedquery/config.toml when present, else built-in defaults
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(config_path) if config_path.exists() => Self::load_from_file(&config_path),
            _ => Ok(Config::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".fedquery").join("config.toml"))
    }

    /// Apply environment overrides through `lookup` (std::env in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ANTHROPIC_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }

        if let Some(provider) = lookup("FEDQUERY_LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&provider).ok_or_else(|| {
                AgentError::ConfigError(format!(
                    "Unsupported LLM provider: {}. Supported: 'anthropic', 'ollama'",
                    provider
                ))
            })?;
        }

        if let Some(model) = lookup("FEDQUERY_LLM_MODEL").filter(|m| !m.trim().is_empty()) {
            self.llm.model = model;
        }

        if let Some(flag) = lookup("FEDQUERY_RERANKER_ENABLED") {
            self.retrieval.reranker_enabled = matches!(
                flag.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(AgentError::ConfigError("llm.model must not be empty".to_string()));
        }

        if self.llm.timeout_secs == 0 || self.search.timeout_secs == 0 {
            return Err(AgentError::ConfigError(
                "timeouts must be greater than 0 seconds".to_string(),
            ));
        }

        if self.search.server_command.trim().is_empty() {
            return Err(AgentError::ConfigError(
                "search.server_command must not be empty".to_string(),
            ));
        }

        if self.retrieval.default_top_k == 0 || self.retrieval.default_top_k > MAX_TOP_K_HINT {
            return Err(AgentError::ConfigError(format!(
                "retrieval.default_top_k must be between 1 and {}",
                MAX_TOP_K_HINT
            )));
        }

        if self.retrieval.overfetch_factor == 0 {
            return Err(AgentError::ConfigError(
                "retrieval.overfetch_factor must be at least 1".to_string(),
            ));
        }

        if self.workflow.max_reformulations > MAX_REFORMULATION_LIMIT {
            return Err(AgentError::ConfigError(format!(
                "workflow.max_reformulations must not exceed {}",
                MAX_REFORMULATION_LIMIT
            )));
        }

        if self.workflow.excerpt_chars == 0 || self.workflow.preview_chars == 0 {
            return Err(AgentError::ConfigError(
                "excerpt and preview lengths must be greater than 0".to_string(),
            ));
        }

        self.confidence.validate()
    }

    /// Credentials required by the selected provider; checked before serving
    pub fn validate_credentials(&self) -> Result<()> {
        if self.llm.provider == LlmProvider::Anthropic && self.llm.api_key.is_none() {
            return Err(AgentError::ConfigError(format!(
                "{} not set. Export your API key: export {}='sk-ant-...'",
                ANTHROPIC_API_KEY_ENV, ANTHROPIC_API_KEY_ENV
            )));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgentError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}
