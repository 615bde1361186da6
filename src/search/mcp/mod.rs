//! MCP (Model Context Protocol) transport for the corpus server

pub mod client;
pub mod connection;

pub use client::{McpSearchClient, DOCUMENT_TOOL, SEARCH_TOOL};
pub use connection::McpConnection;
