//! Error types for FedQuery
//!
//! One error enum for the whole engine. Variants are split so callers can
//! tell an upstream timeout apart from a malformed response or a closed
//! search channel.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the question-answering engine
#[derive(Error, Debug)]
pub enum AgentError {
    /// Workflow state machine transition errors
    #[error("Invalid workflow transition from {from} via {event}: {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    /// Rejected user input (empty question, oversized query)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Language model provider errors
    #[error("Language model error: {0}")]
    LlmError(String),

    /// Search collaborator errors (never mapped to an empty result)
    #[error("Search failed: {0}")]
    SearchError(String),

    /// Malformed JSON-RPC traffic on the MCP channel
    #[error("MCP protocol error: {0}")]
    ProtocolError(String),

    /// The MCP channel closed while a call was in flight
    #[error("MCP channel closed: {0}")]
    ChannelClosed(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Timeout errors
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Generic errors with context
    #[error("Agent error: {0}")]
    Generic(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Convert anyhow errors to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}

impl AgentError {
    /// Failures of the corpus channel rather than of the model or input
    pub fn is_search_failure(&self) -> bool {
        matches!(
            self,
            AgentError::SearchError(_)
                | AgentError::ProtocolError(_)
                | AgentError::ChannelClosed(_)
                | AgentError::Timeout { .. }
        )
    }
}

/// Run `future` under a deadline, mapping expiry to [`AgentError::Timeout`].
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout {
            operation: operation.to_string(),
            duration_ms: limit.as_millis() as u64,
        }),
    }
}
