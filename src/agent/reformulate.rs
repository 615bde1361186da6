//! Query reformulation after weak retrieval

use std::time::Duration;

use crate::errors::{with_timeout, AgentError, Result};
use crate::llm::LanguageModel;
use crate::rag::context::preview_lines;
use crate::types::Candidate;

/// Candidates previewed to the model
pub const PREVIEW_COUNT: usize = 3;

pub const REFORMULATION_SYSTEM_PROMPT: &str = "You are a query reformulation expert for FOMC document search. \
The original query did not retrieve sufficiently relevant results. \
Rephrase the query to improve retrieval. Keep it concise and focused on FOMC-specific terminology. \
Respond with ONLY the reformulated query.";

/// LLM-backed query rewriter
pub struct QueryReformulator<'a> {
    llm: &'a dyn LanguageModel,
    timeout: Duration,
    preview_chars: usize,
}

impl<'a> QueryReformulator<'a> {
    pub fn new(llm: &'a dyn LanguageModel, timeout: Duration, preview_chars: usize) -> Self {
        Self {
            llm,
            timeout,
            preview_chars,
        }
    }

    /// Rewrite `original_query` given the weak candidates it retrieved
    pub async fn reformulate(&self, original_query: &str, candidates: &[Candidate]) -> Result<String> {
        let user_prompt = build_prompt(original_query, candidates, self.preview_chars);

        let reply = with_timeout(
            "reformulation",
            self.timeout,
            self.llm.complete(REFORMULATION_SYSTEM_PROMPT, &user_prompt),
        )
        .await?;

        let rewritten = reply.trim();
        if rewritten.is_empty() {
            return Err(AgentError::LlmError(
                "Reformulation returned an empty query".to_string(),
            ));
        }
        Ok(rewritten.to_string())
    }
}

fn build_prompt(original_query: &str, candidates: &[Candidate], preview_chars: usize) -> String {
    format!(
        "Original query: {}\nRetrieved passages (low relevance):\n{}\nReformulated query:",
        original_query,
        preview_lines(candidates, PREVIEW_COUNT, preview_chars)
    )
}
