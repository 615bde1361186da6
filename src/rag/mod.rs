// Retrieval-augmented generation building blocks
//
// Components:
// - Retrieval: one- or two-pass search with deterministic merge
// - Re-ranking: optional secondary ordering of candidates
// - Confidence: aggregate relevance to an ordinal label
// - Context: numbered source blocks for grounded generation

pub mod confidence;
pub mod context;
pub mod reranking;
pub mod retrieval;

pub use confidence::{ConfidenceClassifier, ConfidenceLevel, ConfidenceThresholds};
pub use context::ContextBuilder;
pub use reranking::{LexicalReranker, Reranker};
pub use retrieval::{merge_passes, RetrievalCoordinator, RetrievalParams};
