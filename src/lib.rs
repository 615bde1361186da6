//! FedQuery - confidence-driven question answering over FOMC documents
//!
//! Answers natural-language questions from a fixed corpus of FOMC
//! statements and minutes, combining retrieval with citation-grounded
//! generation.
//!
//! # Architecture
//!
//! - **search**: corpus access over an MCP stdio channel
//! - **llm**: Anthropic and Ollama completion clients
//! - **rag**: retrieval merge, reranking, confidence, source context
//! - **agent**: triage, reformulation, synthesis, validation, rendering
//!   and the stage machine that drives them

pub mod agent;
pub mod cli;
pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod search;
pub mod types;

// Re-export commonly used types
pub use agent::{EngineConfig, WorkflowEngine, WorkflowOutcome};
pub use config::Config;
pub use errors::{AgentError, Result};
