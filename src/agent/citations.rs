//! Citation validation against retrieved evidence

use std::collections::HashMap;
use tracing::warn;

use crate::types::{char_prefix, Candidate, Citation};

/// Drops citations whose chunk is not among the current candidates and
/// refreshes excerpts from the candidate text.
#[derive(Debug, Clone, Copy)]
pub struct CitationValidator {
    excerpt_chars: usize,
}

impl CitationValidator {
    pub fn new(excerpt_chars: usize) -> Self {
        Self { excerpt_chars }
    }

    pub fn validate(&self, citations: Vec<Citation>, candidates: &[Candidate]) -> Vec<Citation> {
        let lookup: HashMap<&str, &str> = candidates
            .iter()
            .map(|c| (c.chunk_id.as_str(), c.chunk_text.as_str()))
            .collect();

        citations
            .into_iter()
            .filter_map(|mut citation| match lookup.get(citation.chunk_id.as_str()) {
                Some(text) => {
                    citation.quoted_excerpt = char_prefix(text, self.excerpt_chars).to_string();
                    Some(citation)
                }
                None => {
                    warn!(
                        chunk_id = %citation.chunk_id,
                        source_index = citation.source_index,
                        "Dropping citation with unknown chunk_id"
                    );
                    None
                }
            })
            .collect()
    }
}

impl Default for CitationValidator {
    fn default() -> Self {
        Self::new(200)
    }
}
