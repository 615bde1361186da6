//! Candidate reranking

pub mod scorer;

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::Candidate;

pub use scorer::{LexicalReranker, ReRankConfig};

/// Reorders candidates by a secondary score.
///
/// Implementations set `rerank_score` on every candidate they return and
/// sort descending by it. `relevance_score` is left untouched.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: Option<usize>,
    ) -> Result<Vec<Candidate>>;
}
