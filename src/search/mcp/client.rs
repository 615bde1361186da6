//! MCP-backed search and document lookup
//!
//! Spawns the corpus server as a child process and talks to it over
//! stdio. Tools consumed: `search_fomc` and `get_document`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::errors::{with_timeout, AgentError, Result};
use crate::search::mcp::connection::McpConnection;
use crate::search::provider::{DocumentLookup, SearchProvider};
use crate::types::{Candidate, DateRange, Document};

/// Tool name for ranked passage search
pub const SEARCH_TOOL: &str = "search_fomc";

/// Tool name for full-document retrieval
pub const DOCUMENT_TOOL: &str = "get_document";

/// Time allowed for the child to exit after stdin closes
const CHILD_EXIT_GRACE: Duration = Duration::from_secs(3);

/// Search client speaking MCP to an out-of-process corpus server
pub struct McpSearchClient {
    connection: McpConnection,
    child: Mutex<Option<Child>>,
    handshake_timeout: Duration,
}

impl McpSearchClient {
    /// Start the configured server process and complete the handshake
    pub async fn spawn(config: &SearchConfig) -> Result<Self> {
        let mut command = Command::new(&config.server_command);
        command
            .args(&config.server_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            AgentError::SearchError(format!(
                "failed to start MCP server `{}`: {}",
                config.server_command, e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::SearchError("MCP server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::SearchError("MCP server stdout unavailable".to_string()))?;

        let connection = McpConnection::new(stdout, stdin, config.request_timeout());
        let client = Self {
            connection,
            child: Mutex::new(Some(child)),
            handshake_timeout: config.request_timeout(),
        };

        if let Err(e) = client.handshake().await {
            client.close().await;
            return Err(e);
        }

        info!(server = %config.server_command, "MCP search server started");
        Ok(client)
    }

    /// Use an already-established connection (no child process to manage)
    pub async fn from_connection(connection: McpConnection, handshake_timeout: Duration) -> Result<Self> {
        let client = Self {
            connection,
            child: Mutex::new(None),
            handshake_timeout,
        };
        client.handshake().await?;
        Ok(client)
    }

    async fn handshake(&self) -> Result<()> {
        let server_info = with_timeout(
            "MCP initialize",
            self.handshake_timeout,
            self.connection
                .initialize(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        )
        .await?;
        debug!(server_info = %server_info, "MCP handshake complete");
        Ok(())
    }

    pub fn connection(&self) -> &McpConnection {
        &self.connection
    }

    /// Tear the channel down and reap the server process
    pub async fn close(&self) {
        self.connection.shutdown().await;

        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            match tokio::time::timeout(CHILD_EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "MCP server exited"),
                Ok(Err(e)) => warn!(error = %e, "waiting on MCP server failed"),
                Err(_) => {
                    warn!("MCP server did not exit after stdin closed, killing it");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "killing MCP server failed");
                    }
                }
            }
        }
    }
}

#[async_trait]
impl SearchProvider for McpSearchClient {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&DateRange>,
    ) -> Result<Vec<Candidate>> {
        let text = self
            .connection
            .call_tool(SEARCH_TOOL, search_arguments(query, top_k, filter))
            .await?;
        parse_search_payload(&text)
    }
}

#[async_trait]
impl DocumentLookup for McpSearchClient {
    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let text = self
            .connection
            .call_tool(DOCUMENT_TOOL, json!({ "document_id": document_id }))
            .await?;
        parse_document_payload(&text)
    }
}

/// Arguments for the search tool; date bounds only when filtering
pub fn search_arguments(query: &str, top_k: usize, filter: Option<&DateRange>) -> Value {
    let mut arguments = json!({ "query": query, "top_k": top_k });
    if let Some(range) = filter {
        arguments["date_start"] = json!(range.start_iso());
        arguments["date_end"] = json!(range.end_iso());
    }
    arguments
}

/// Decode a search reply: a candidate array or an `{"error": ..}` object
pub fn parse_search_payload(text: &str) -> Result<Vec<Candidate>> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| AgentError::ProtocolError(format!("search reply is not JSON: {}", e)))?;

    if let Some(error) = payload.get("error").and_then(Value::as_str) {
        return Err(AgentError::SearchError(error.to_string()));
    }

    let candidates: Vec<Candidate> = serde_json::from_value(payload)
        .map_err(|e| AgentError::ProtocolError(format!("malformed search reply: {}", e)))?;

    Ok(candidates.into_iter().map(Candidate::normalized).collect())
}

/// Decode a document reply; `not_found` maps to `None`
pub fn parse_document_payload(text: &str) -> Result<Option<Document>> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| AgentError::ProtocolError(format!("document reply is not JSON: {}", e)))?;

    match payload.get("error").and_then(Value::as_str) {
        Some("not_found") => Ok(None),
        Some(other) => Err(AgentError::SearchError(other.to_string())),
        None => serde_json::from_value(payload)
            .map(Some)
            .map_err(|e| AgentError::ProtocolError(format!("malformed document reply: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_arguments_without_filter() {
        let args = search_arguments("inflation outlook", 10, None);
        assert_eq!(args["query"], "inflation outlook");
        assert_eq!(args["top_k"], 10);
        assert!(args.get("date_start").is_none());
    }

    #[test]
    fn test_search_arguments_with_filter() {
        let range = DateRange::month(2024, 12).unwrap();
        let args = search_arguments("dissent", 15, Some(&range));
        assert_eq!(args["date_start"], "2024-12-01");
        assert_eq!(args["date_end"], "2024-12-31");
    }

    #[test]
    fn test_parse_search_payload_clamps_scores() {
        let text = r#"[
            {"chunk_id": "a", "document_name": "Statement", "relevance_score": 1.2},
            {"chunk_id": "b", "document_name": "Minutes", "relevance_score": 0.4}
        ]"#;
        let candidates = parse_search_payload(text).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].relevance_score, 1.0);
        assert_eq!(candidates[1].chunk_id, "b");
    }

    #[test]
    fn test_parse_search_payload_empty_is_ok() {
        assert!(parse_search_payload("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_search_payload_error_object() {
        let err = parse_search_payload(r#"{"error": "empty_corpus"}"#).unwrap_err();
        assert!(matches!(err, AgentError::SearchError(ref m) if m == "empty_corpus"));
    }

    #[test]
    fn test_parse_search_payload_garbage() {
        assert!(matches!(
            parse_search_payload("not json").unwrap_err(),
            AgentError::ProtocolError(_)
        ));
    }

    #[test]
    fn test_parse_document_payload() {
        let text = r#"{
            "id": "fomc-2024-12-18-statement",
            "title": "FOMC Statement",
            "date": "2024-12-18",
            "document_type": "statement",
            "source_url": "https://www.federalreserve.gov/",
            "full_text": "Recent indicators suggest...",
            "chunk_count": 3
        }"#;
        let doc = parse_document_payload(text).unwrap().unwrap();
        assert_eq!(doc.chunk_count, 3);
        assert_eq!(doc.document_type, "statement");

        assert!(parse_document_payload(r#"{"error": "not_found"}"#)
            .unwrap()
            .is_none());
    }
}
