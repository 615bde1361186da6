//! Grounded answer generation and citation extraction

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::errors::{with_timeout, Result};
use crate::llm::LanguageModel;
use crate::rag::context::ContextBuilder;
use crate::types::{Candidate, Citation};

/// Bracketed reference spans: `[Source 3]`, `[Sources 2, 5]`, `[Source 1, Source 4]`
pub(crate) static SOURCE_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Sources?\s+[^\]]+\]").unwrap());

/// Integers inside a reference span
pub(crate) static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a research assistant answering questions about FOMC monetary policy. \
Answer ONLY based on the provided source passages. \
For each claim, cite the source using [Source N] notation; cite several as [Source N, Source M]. \
If the sources don't contain enough information, say so. Be precise and factual.";

/// Generated answer with the citations it references
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// LLM-backed answer generator
pub struct AnswerSynthesizer<'a> {
    llm: &'a dyn LanguageModel,
    timeout: Duration,
    excerpt_chars: usize,
    context: ContextBuilder,
}

impl<'a> AnswerSynthesizer<'a> {
    pub fn new(llm: &'a dyn LanguageModel, timeout: Duration, excerpt_chars: usize) -> Self {
        Self {
            llm,
            timeout,
            excerpt_chars,
            context: ContextBuilder::new(),
        }
    }

    pub async fn synthesize(&self, query: &str, candidates: &[Candidate]) -> Result<Synthesis> {
        let context = self.context.build(candidates);
        debug!(
            sources = context.source_count,
            estimated_tokens = context.estimated_tokens,
            "Built synthesis context"
        );

        let user_prompt = format!(
            "Question: {}\n\nSource passages:\n{}\n\nAnswer:",
            query, context.text
        );

        let answer = with_timeout(
            "synthesis",
            self.timeout,
            self.llm.complete(SYNTHESIS_SYSTEM_PROMPT, &user_prompt),
        )
        .await?;

        let indices = extract_source_indices(&answer);
        let citations = build_citations(&indices, candidates, self.excerpt_chars);

        Ok(Synthesis { answer, citations })
    }
}

/// Every source index referenced in `text`, deduplicated in order of first
/// appearance. Indices are not range-checked here.
pub fn extract_source_indices(text: &str) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut indices = Vec::new();

    for span in SOURCE_SPAN_RE.find_iter(text) {
        for digits in INDEX_RE.find_iter(span.as_str()) {
            let Ok(index) = digits.as_str().parse::<usize>() else {
                continue;
            };
            if seen.insert(index) {
                indices.push(index);
            }
        }
    }

    indices
}

/// Citations for the indices that fall inside `1..=candidates.len()`.
///
/// Out-of-range indices are model noise and are skipped silently.
pub fn build_citations(
    indices: &[usize],
    candidates: &[Candidate],
    excerpt_chars: usize,
) -> Vec<Citation> {
    indices
        .iter()
        .filter_map(|&index| {
            let candidate = candidates.get(index.checked_sub(1)?)?;
            Some(Citation::from_candidate(index, candidate, excerpt_chars))
        })
        .collect()
}
