//! JSON-RPC connection over a persistent byte stream
//!
//! Requests are written as newline-delimited JSON and correlated with their
//! replies through a table of oneshot senders keyed by request id. A single
//! reader task owns the inbound half of the stream and routes each reply to
//! the caller blocked on it, so several calls may be in flight at once.
//!
//! # Shutdown
//!
//! `shutdown()` marks the connection closed, fails every in-flight call with
//! [`AgentError::ChannelClosed`], closes the outbound half (the server sees
//! EOF on stdin) and then waits briefly for the reader to drain before
//! aborting it. If the server dies first, the reader fails pending calls
//! itself when the stream ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{AgentError, Result};

/// MCP protocol revision announced during `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// How long shutdown waits for the reader task before aborting it
const READER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type Reply = Result<Value>;
type PendingTable = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Multiplexed request/response channel to an MCP server
pub struct McpConnection {
    writer: AsyncMutex<Option<BoxedWriter>>,
    pending: PendingTable,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl McpConnection {
    /// Wrap a stream pair and start the reader task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader_task = tokio::spawn(read_loop(reader, pending.clone(), closed.clone()));

        Self {
            writer: AsyncMutex::new(Some(Box::new(writer))),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            reader_task: Mutex::new(Some(reader_task)),
            request_timeout,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of requests still waiting for a reply
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Send a request and wait for its correlated reply
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if self.is_closed() {
            return Err(closed_error(method));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.register(id, tx, method)?;

        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        if let Err(e) = self.send(&message).await {
            lock(&self.pending).remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(AgentError::ChannelClosed(format!(
                "reply channel for {} (id {}) dropped",
                method, id
            ))),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(AgentError::Timeout {
                    operation: format!("MCP {}", method),
                    duration_ms: self.request_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Send a notification (no id, no reply)
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error(method));
        }

        self.send(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
        .await
    }

    /// Perform the MCP initialize handshake
    pub async fn initialize(&self, client_name: &str, client_version: &str) -> Result<Value> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": client_name, "version": client_version },
                }),
            )
            .await?;

        self.notify("notifications/initialized", json!({})).await?;
        Ok(result)
    }

    /// Invoke a server tool and return its concatenated text content
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;

        let text = tool_text(&result)?;
        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(AgentError::SearchError(format!(
                "tool {} reported an error: {}",
                name, text
            )));
        }
        Ok(text)
    }

    /// Fail in-flight calls, close the outbound stream and stop the reader
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        fail_pending(&self.pending, "connection shut down");

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "closing MCP writer failed");
            }
        }

        let handle = lock(&self.reader_task).take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(READER_SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
            {
                warn!("MCP reader did not drain in time, aborting");
                handle.abort();
            }
        }
    }

    /// Add a reply slot, backing out if the reader closed in the meantime.
    ///
    /// The reader drains the table once when the stream ends, so a slot
    /// inserted after that drain would otherwise wait out the full timeout.
    fn register(&self, id: u64, tx: oneshot::Sender<Reply>, method: &str) -> Result<()> {
        lock(&self.pending).insert(id, tx);
        if self.is_closed() {
            lock(&self.pending).remove(&id);
            return Err(closed_error(method));
        }
        Ok(())
    }

    async fn send(&self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| AgentError::ChannelClosed("writer already shut down".to_string()))?;

        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Drop for McpConnection {
    fn drop(&mut self) {
        if let Ok(slot) = self.reader_task.get_mut() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

async fn read_loop<R>(reader: R, pending: PendingTable, closed: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch_line(&line, &pending),
            Ok(None) => {
                debug!("MCP server closed its output stream");
                break;
            }
            Err(e) => {
                warn!(error = %e, "reading from MCP server failed");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    fail_pending(&pending, "server stream ended");
}

/// Route one inbound line to the caller waiting on its id
fn dispatch_line(line: &str, pending: &PendingTable) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let message: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "skipping non-JSON line from MCP server");
            return;
        }
    };

    // Server-initiated requests and notifications carry a method
    if let Some(method) = message.get("method").and_then(Value::as_str) {
        debug!(method, "ignoring server-initiated message");
        return;
    }

    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        debug!("skipping MCP message without a numeric id");
        return;
    };

    let Some(sender) = lock(pending).remove(&id) else {
        debug!(id, "reply for unknown or expired request");
        return;
    };

    let reply = match message.get("error") {
        Some(error) => Err(AgentError::ProtocolError(format!(
            "{} (code {})",
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error"),
            error.get("code").and_then(Value::as_i64).unwrap_or_default()
        ))),
        None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
    };

    // Receiver gone means the caller already timed out
    let _ = sender.send(reply);
}

fn closed_error(method: &str) -> AgentError {
    AgentError::ChannelClosed(format!("cannot send {}: connection is closed", method))
}

fn fail_pending(pending: &PendingTable, reason: &str) {
    let drained: Vec<(u64, oneshot::Sender<Reply>)> = lock(pending).drain().collect();
    for (id, sender) in drained {
        let _ = sender.send(Err(AgentError::ChannelClosed(format!(
            "{} before reply to request {}",
            reason, id
        ))));
    }
}

fn tool_text(result: &Value) -> Result<String> {
    let content = result
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AgentError::ProtocolError("tools/call result has no content array".to_string())
        })?;

    Ok(content
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(""))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[test]
    fn test_tool_text_concatenates_text_blocks() {
        let result = json!({
            "content": [
                {"type": "text", "text": "[1, "},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "2]"}
            ]
        });
        assert_eq!(tool_text(&result).unwrap(), "[1, 2]");
    }

    #[test]
    fn test_tool_text_requires_content() {
        assert!(tool_text(&json!({"isError": false})).is_err());
    }

    #[tokio::test]
    async fn test_replies_routed_by_id_out_of_order() {
        let (client_side, server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, mut server_write) = tokio::io::split(server_side);

        let connection = Arc::new(McpConnection::new(
            client_read,
            client_write,
            Duration::from_secs(5),
        ));

        // Server answers the two requests in reverse order
        let server = tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let mut ids = Vec::new();
            while ids.len() < 2 {
                let line = lines.next_line().await.unwrap().unwrap();
                let msg: Value = serde_json::from_str(&line).unwrap();
                ids.push((msg["id"].as_u64().unwrap(), msg["method"].as_str().unwrap().to_string()));
            }
            for (id, method) in ids.into_iter().rev() {
                let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"echo": method}});
                server_write
                    .write_all(format!("{}\n", reply).as_bytes())
                    .await
                    .unwrap();
            }
            server_write.flush().await.unwrap();
        });

        let (a, b) = tokio::join!(
            connection.request("first", json!({})),
            connection.request("second", json!({}))
        );

        assert_eq!(a.unwrap()["echo"], "first");
        assert_eq!(b.unwrap()["echo"], "second");
        server.await.unwrap();
        assert_eq!(connection.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_error_reply_becomes_protocol_error() {
        let (client_side, server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, mut server_write) = tokio::io::split(server_side);
        let connection = McpConnection::new(client_read, client_write, Duration::from_secs(5));

        tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let msg: Value = serde_json::from_str(&line).unwrap();
            let reply = json!({
                "jsonrpc": "2.0",
                "id": msg["id"],
                "error": {"code": -32601, "message": "Method not found"}
            });
            server_write
                .write_all(format!("{}\n", reply).as_bytes())
                .await
                .unwrap();
        });

        let err = connection.request("bogus", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ProtocolError(ref m) if m.contains("-32601")));
    }

    #[tokio::test]
    async fn test_server_eof_fails_in_flight_calls() {
        let (client_side, server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let connection = McpConnection::new(client_read, client_write, Duration::from_secs(5));

        tokio::spawn(async move {
            let (server_read, _server_write) = tokio::io::split(server_side);
            let mut lines = BufReader::new(server_read).lines();
            // Read the request, then hang up without answering
            let _ = lines.next_line().await;
        });

        let err = connection.request("search", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ChannelClosed(_)));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_request_timeout_is_distinguishable() {
        let (client_side, _server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let connection =
            McpConnection::new(client_read, client_write, Duration::from_millis(50));

        let err = connection.request("slow", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout { .. }));
        assert_eq!(connection.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_further_calls() {
        let (client_side, _server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let connection = McpConnection::new(client_read, client_write, Duration::from_secs(5));

        connection.shutdown().await;
        assert!(connection.is_closed());
        let err = connection.request("search", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ChannelClosed(_)));
    }

    #[tokio::test]
    async fn test_register_backs_out_when_reader_already_closed() {
        let (client_side, _server_side) = duplex(64);
        let (client_read, client_write) = tokio::io::split(client_side);
        let connection = McpConnection::new(client_read, client_write, Duration::from_secs(30));

        // reader drained the table before this slot was added
        connection.closed.store(true, Ordering::SeqCst);
        let (tx, _rx) = oneshot::channel();

        let result = connection.register(7, tx, "tools/call");
        assert!(matches!(result, Err(AgentError::ChannelClosed(_))));
        assert_eq!(connection.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_request_fails_fast_when_server_stream_ends() {
        let connection = McpConnection::new(
            tokio::io::empty(),
            tokio::io::sink(),
            Duration::from_secs(30),
        );

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            connection.request("tools/call", json!({})),
        )
        .await
        .expect("request waited for the full timeout");

        assert!(matches!(result, Err(AgentError::ChannelClosed(_))));
        assert_eq!(connection.in_flight(), 0);
    }
}
