// Source context assembly for grounded generation
use serde::{Deserialize, Serialize};

use crate::types::{char_prefix, Candidate};

/// Assembled context for prompt augmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    /// The formatted context text
    pub text: String,
    /// Number of sources included
    pub source_count: usize,
    /// Estimated token count
    pub estimated_tokens: usize,
}

/// Context builder for numbered "Source N" blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Enumerate every candidate as a 1-based source.
    ///
    /// All candidates are included so that source numbers always match
    /// candidate positions.
    pub fn build(&self, candidates: &[Candidate]) -> AssembledContext {
        let text = candidates
            .iter()
            .enumerate()
            .map(|(idx, candidate)| format_source(idx + 1, candidate))
            .collect::<Vec<_>>()
            .join("\n\n");

        // Rough: ~4 chars per token
        let estimated_tokens = text.len() / 4;

        AssembledContext {
            text,
            source_count: candidates.len(),
            estimated_tokens,
        }
    }
}

/// Format a single source entry
pub fn format_source(index: usize, candidate: &Candidate) -> String {
    format!(
        "[Source {}] {} ({}), §{}\n{}",
        index,
        candidate.document_name,
        candidate.document_date,
        candidate.section_header,
        candidate.chunk_text
    )
}

/// Short previews of the first `limit` candidates, one per line
pub fn preview_lines(candidates: &[Candidate], limit: usize, preview_chars: usize) -> String {
    candidates
        .iter()
        .take(limit)
        .map(|candidate| format!("- {}...", char_prefix(&candidate.chunk_text, preview_chars)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, text: &str) -> Candidate {
        Candidate {
            chunk_id: format!("{}-chunk", name),
            document_name: name.to_string(),
            document_date: "2024-12-18".to_string(),
            document_id: "doc".to_string(),
            section_header: "Policy Decision".to_string(),
            chunk_text: text.to_string(),
            relevance_score: 0.5,
            rerank_score: None,
        }
    }

    #[test]
    fn test_build_numbers_sources_from_one() {
        let builder = ContextBuilder::new();
        let context = builder.build(&[
            candidate("FOMC Statement", "The Committee decided to lower the target range."),
            candidate("FOMC Minutes", "Participants noted inflation had eased."),
        ]);

        assert_eq!(context.source_count, 2);
        assert!(context.text.starts_with(
            "[Source 1] FOMC Statement (2024-12-18), §Policy Decision\nThe Committee"
        ));
        assert!(context
            .text
            .contains("\n\n[Source 2] FOMC Minutes (2024-12-18), §Policy Decision\n"));
    }

    #[test]
    fn test_build_empty() {
        let context = ContextBuilder::new().build(&[]);
        assert!(context.text.is_empty());
        assert_eq!(context.source_count, 0);
    }

    #[test]
    fn test_preview_lines_limit_and_length() {
        let long = "x".repeat(150);
        let candidates = vec![
            candidate("a", &long),
            candidate("b", "short"),
            candidate("c", "third"),
            candidate("d", "fourth"),
        ];

        let previews = preview_lines(&candidates, 3, 100);
        let lines: Vec<&str> = previews.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("- {}...", "x".repeat(100)));
        assert_eq!(lines[1], "- short...");
    }
}
