//! Per-request workflow state
//!
//! A [`WorkflowState`] is created when a question arrives and consumed into
//! a [`WorkflowOutcome`] once the response is rendered. Nothing survives
//! across requests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::state::WorkflowStage;
use crate::rag::confidence::ConfidenceLevel;
use crate::types::{Candidate, Citation, MetadataHints};

/// Mutable aggregate threaded through the stages of one request
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub request_id: Uuid,
    pub query: String,
    pub needs_retrieval: bool,
    pub hints: MetadataHints,
    pub reformulated_query: Option<String>,
    pub candidates: Vec<Candidate>,
    pub confidence: ConfidenceLevel,
    reformulation_attempts: u32,
    pub citations: Vec<Citation>,
    pub answer: Option<String>,
    pub stages_visited: Vec<WorkflowStage>,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            query: query.into(),
            needs_retrieval: false,
            hints: MetadataHints::none(),
            reformulated_query: None,
            candidates: Vec::new(),
            confidence: ConfidenceLevel::Insufficient,
            reformulation_attempts: 0,
            citations: Vec::new(),
            answer: None,
            stages_visited: Vec::new(),
        }
    }

    /// Query used for retrieval: the latest rewrite, else the original
    pub fn effective_query(&self) -> &str {
        self.reformulated_query.as_deref().unwrap_or(&self.query)
    }

    pub fn reformulation_attempts(&self) -> u32 {
        self.reformulation_attempts
    }

    /// Record a rewrite; the attempt counter only ever grows
    pub fn record_reformulation(&mut self, query: String) {
        self.reformulation_attempts += 1;
        self.reformulated_query = Some(query);
    }

    /// Queries issued so far, original first
    pub fn searched_queries(&self) -> Vec<&str> {
        let mut queries = vec![self.query.as_str()];
        if let Some(reformulated) = self.reformulated_query.as_deref() {
            queries.push(reformulated);
        }
        queries
    }

    pub fn into_outcome(self) -> WorkflowOutcome {
        WorkflowOutcome {
            request_id: self.request_id,
            query: self.query,
            answer: self.answer.unwrap_or_default(),
            confidence: self.confidence,
            citations: self.citations,
            reformulated_query: self.reformulated_query,
            reformulation_attempts: self.reformulation_attempts,
            stages_visited: self.stages_visited,
        }
    }
}

/// Final result of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub request_id: Uuid,
    pub query: String,
    /// Grounded answer with footer, or the uncertainty message
    pub answer: String,
    pub confidence: ConfidenceLevel,
    pub citations: Vec<Citation>,
    pub reformulated_query: Option<String>,
    pub reformulation_attempts: u32,
    pub stages_visited: Vec<WorkflowStage>,
}
