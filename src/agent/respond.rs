//! Final response rendering
//!
//! Either a grounded answer whose `[Source N]` markers are renumbered to a
//! dense `[1]..[N]` sequence with a matching footer, or a fixed message
//! saying the corpus did not support an answer.

use std::collections::HashMap;

use crate::agent::synthesis::{INDEX_RE, SOURCE_SPAN_RE};
use crate::agent::workflow::WorkflowState;
use crate::rag::confidence::ConfidenceLevel;
use crate::types::{Candidate, Citation};

/// Candidates listed in the uncertainty message
pub const BEST_MATCH_COUNT: usize = 3;

const UNCERTAINTY_PREAMBLE: &str = "I was unable to find sufficient information in the FOMC document corpus \
to answer this question confidently. The available documents may not cover this topic.";

/// Renders the terminal response
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Fill in the final answer and settle the citation list on `state`
    pub fn render(&self, state: &mut WorkflowState) {
        let grounded_answer = match state.answer.as_deref() {
            Some(answer)
                if !answer.trim().is_empty()
                    && state.confidence != ConfidenceLevel::Insufficient =>
            {
                Some(format_grounded(answer, &state.citations))
            }
            _ => None,
        };

        match grounded_answer {
            Some(answer) => state.answer = Some(answer),
            None => {
                let message = uncertainty_response(&state.searched_queries(), &state.candidates);
                state.answer = Some(message);
                state.citations.clear();
            }
        }
    }
}

/// Fixed insufficient-evidence message
pub fn uncertainty_response(queries: &[&str], candidates: &[Candidate]) -> String {
    let best_matches = candidates
        .iter()
        .take(BEST_MATCH_COUNT)
        .enumerate()
        .map(|(i, c)| format!("  [{}] {} (score: {:.2})", i + 1, c.document_name, c.relevance_score))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nSearched: {}\nBest matches (low relevance):\n{}",
        UNCERTAINTY_PREAMBLE,
        queries.join(", "),
        best_matches
    )
}

/// Original `source_index` → dense 1-based position in citation order.
///
/// A repeated source index keeps its first position.
pub fn dense_index_map(citations: &[Citation]) -> HashMap<usize, usize> {
    let mut map = HashMap::new();
    for citation in citations {
        let next = map.len() + 1;
        map.entry(citation.source_index).or_insert(next);
    }
    map
}

/// Rewrite every reference span through `map`.
///
/// `[Source 6]` becomes `[1]` and `[Sources 6, 10]` becomes `[1, 2]`;
/// spans with no mapped index are left as written.
pub fn renumber_citations(answer: &str, map: &HashMap<usize, usize>) -> String {
    SOURCE_SPAN_RE
        .replace_all(answer, |caps: &regex::Captures<'_>| {
            let span = &caps[0];
            let remapped: Vec<String> = INDEX_RE
                .find_iter(span)
                .filter_map(|m| m.as_str().parse::<usize>().ok())
                .filter_map(|index| map.get(&index))
                .map(|dense| dense.to_string())
                .collect();

            if remapped.is_empty() {
                span.to_string()
            } else {
                format!("[{}]", remapped.join(", "))
            }
        })
        .into_owned()
}

/// Footer listing sources in dense order
pub fn sources_footer(citations: &[Citation]) -> String {
    citations
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "  [{}] {}, {}, §{} (chunk {})",
                i + 1,
                c.document_name,
                c.document_date,
                c.section_header,
                c.short_chunk_id()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_grounded(answer: &str, citations: &[Citation]) -> String {
    let body = renumber_citations(answer, &dense_index_map(citations));
    if citations.is_empty() {
        body
    } else {
        format!("{}\n\nSources:\n{}", body, sources_footer(citations))
    }
}
