// Lexical reranker: similarity plus a bounded keyword-overlap boost
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::rag::reranking::Reranker;
use crate::types::Candidate;

/// Re-ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReRankConfig {
    /// Maximum boost for query terms found in the passage
    pub keyword_boost: f64,
    /// Terms at or below this length are ignored
    pub min_term_len: usize,
}

impl Default for ReRankConfig {
    fn default() -> Self {
        Self {
            keyword_boost: 0.1,
            min_term_len: 3,
        }
    }
}

/// Re-ranker for improving retrieval results
#[derive(Debug, Clone, Default)]
pub struct LexicalReranker {
    config: ReRankConfig,
}

impl LexicalReranker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReRankConfig) -> Self {
        Self { config }
    }

    /// Similarity plus keyword boost, capped at 1.0
    pub fn compute_score(&self, candidate: &Candidate, query: &str) -> f64 {
        (candidate.relevance_score + self.compute_keyword_boost(candidate, query)).min(1.0)
    }

    /// Compute keyword boost for exact matches
    fn compute_keyword_boost(&self, candidate: &Candidate, query: &str) -> f64 {
        let query_lower = query.to_lowercase();
        let content_lower = candidate.chunk_text.to_lowercase();

        let query_words: Vec<&str> = query_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        if query_words.is_empty() {
            return 0.0;
        }

        let matches = query_words
            .iter()
            .filter(|word| word.len() > self.config.min_term_len && content_lower.contains(*word))
            .count();

        let boost_per_match = self.config.keyword_boost / query_words.len() as f64;
        (matches as f64 * boost_per_match).min(self.config.keyword_boost)
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: Option<usize>,
    ) -> Result<Vec<Candidate>> {
        let mut ranked: Vec<Candidate> = candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.rerank_score = Some(self.compute_score(&candidate, query));
                candidate
            })
            .collect();

        // Stable: ties keep search order
        ranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(k) = top_k {
            ranked.truncate(k);
        }
        Ok(ranked)
    }
}
