//! Corpus access
//!
//! Collaborator traits plus the MCP stdio client that implements them.

pub mod mcp;
pub mod provider;

pub use mcp::{McpConnection, McpSearchClient};
pub use provider::{DocumentLookup, SearchProvider};
