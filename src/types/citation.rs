//! Citation linking an answer claim to a retrieved passage

use serde::{Deserialize, Serialize};

use crate::types::candidate::Candidate;

/// Reference from generated text back to a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position among the candidates the model was shown
    pub source_index: usize,
    pub chunk_id: String,
    pub document_name: String,
    pub document_date: String,
    pub section_header: String,
    pub relevance_score: f64,
    /// Bounded prefix of the candidate text, recomputed on validation
    pub quoted_excerpt: String,
}

impl Citation {
    /// Citation for `candidate` shown to the model as `[Source source_index]`
    pub fn from_candidate(source_index: usize, candidate: &Candidate, excerpt_chars: usize) -> Self {
        Self {
            source_index,
            chunk_id: candidate.chunk_id.clone(),
            document_name: candidate.document_name.clone(),
            document_date: candidate.document_date.clone(),
            section_header: candidate.section_header.clone(),
            relevance_score: candidate.relevance_score,
            quoted_excerpt: candidate.excerpt(excerpt_chars).to_string(),
        }
    }

    /// Chunk id shortened for display footers
    pub fn short_chunk_id(&self) -> &str {
        crate::types::candidate::char_prefix(&self.chunk_id, 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_candidate_copies_identity() {
        let candidate = Candidate {
            chunk_id: "0123456789abcdef".to_string(),
            document_name: "FOMC Minutes".to_string(),
            document_date: "2024-11-07".to_string(),
            document_id: "minutes-2024-11".to_string(),
            section_header: "Staff Review".to_string(),
            chunk_text: "x".repeat(500),
            relevance_score: 0.58,
            rerank_score: None,
        };

        let citation = Citation::from_candidate(4, &candidate, 200);
        assert_eq!(citation.source_index, 4);
        assert_eq!(citation.chunk_id, candidate.chunk_id);
        assert_eq!(citation.quoted_excerpt.chars().count(), 200);
        assert_eq!(citation.short_chunk_id(), "01234567");
    }
}
