//! Retrieved evidence types
//!
//! A [`Candidate`] is one ranked passage returned by the search provider.
//! Field names follow the normalized schema shared with the MCP server.

use serde::{Deserialize, Serialize};

/// Retrieved passage with document identity and normalized relevance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: String,
    #[serde(default)]
    pub document_name: String,
    /// ISO date (`YYYY-MM-DD`), empty when the index has no date
    #[serde(default)]
    pub document_date: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub section_header: String,
    #[serde(default)]
    pub chunk_text: String,
    /// Similarity in [0, 1]
    pub relevance_score: f64,
    /// Set by a reranker; never used for confidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
}

impl Candidate {
    /// Clamp the relevance score into [0, 1]; NaN becomes 0.
    pub fn normalized(mut self) -> Self {
        self.relevance_score = if self.relevance_score.is_nan() {
            0.0
        } else {
            self.relevance_score.clamp(0.0, 1.0)
        };
        self
    }

    /// Bounded prefix of the passage text
    pub fn excerpt(&self, max_chars: usize) -> &str {
        char_prefix(&self.chunk_text, max_chars)
    }
}

/// Full document returned by the lookup tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub chunk_count: usize,
}

/// Longest prefix of `text` holding at most `max_chars` characters.
///
/// Slices on a char boundary so multi-byte text never panics.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
