//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use fedquery::agent::reformulate::REFORMULATION_SYSTEM_PROMPT;
use fedquery::agent::synthesis::SYNTHESIS_SYSTEM_PROMPT;
use fedquery::agent::triage::TRIAGE_SYSTEM_PROMPT;
use fedquery::llm::LanguageModel;
use fedquery::search::SearchProvider;
use fedquery::types::{Candidate, DateRange};
use fedquery::{AgentError, Result};

/// Which stage prompted the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompted {
    Triage,
    Reformulate,
    Synthesize,
}

/// Model that answers each stage from a script
pub struct ScriptedModel {
    triage_reply: String,
    reformulations: Mutex<VecDeque<String>>,
    fail_reformulation: bool,
    answer: Option<String>,
    calls: Mutex<Vec<Prompted>>,
}

impl ScriptedModel {
    pub fn new(triage_reply: &str) -> Self {
        Self {
            triage_reply: triage_reply.to_string(),
            reformulations: Mutex::new(VecDeque::new()),
            fail_reformulation: false,
            answer: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_answer(mut self, answer: &str) -> Self {
        self.answer = Some(answer.to_string());
        self
    }

    pub fn with_reformulations(self, queries: &[&str]) -> Self {
        *self.reformulations.lock().unwrap() = queries.iter().map(|q| q.to_string()).collect();
        self
    }

    pub fn failing_reformulation(mut self) -> Self {
        self.fail_reformulation = true;
        self
    }

    pub fn calls(&self) -> Vec<Prompted> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, stage: Prompted) -> usize {
        self.calls().iter().filter(|c| **c == stage).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, system_prompt: &str, _user_prompt: &str) -> Result<String> {
        if system_prompt == TRIAGE_SYSTEM_PROMPT {
            self.calls.lock().unwrap().push(Prompted::Triage);
            return Ok(self.triage_reply.clone());
        }

        if system_prompt == REFORMULATION_SYSTEM_PROMPT {
            self.calls.lock().unwrap().push(Prompted::Reformulate);
            if self.fail_reformulation {
                return Err(AgentError::LlmError("model overloaded".to_string()));
            }
            let next = self.reformulations.lock().unwrap().pop_front();
            return Ok(next.unwrap_or_else(|| "FOMC policy statement".to_string()));
        }

        if system_prompt == SYNTHESIS_SYSTEM_PROMPT {
            self.calls.lock().unwrap().push(Prompted::Synthesize);
            return self
                .answer
                .clone()
                .ok_or_else(|| AgentError::LlmError("synthesis unavailable".to_string()));
        }

        Err(AgentError::LlmError("unexpected prompt".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// One recorded search call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    pub query: String,
    pub top_k: usize,
    pub filter: Option<DateRange>,
}

/// Search provider returning fixed ranked lists
#[derive(Default)]
pub struct ScriptedSearch {
    filtered: Vec<Candidate>,
    unfiltered: Vec<Candidate>,
    by_query: HashMap<String, Vec<Candidate>>,
    fail: bool,
    calls: Mutex<Vec<SearchCall>>,
}

impl ScriptedSearch {
    pub fn new(unfiltered: Vec<Candidate>) -> Self {
        Self {
            unfiltered,
            ..Self::default()
        }
    }

    pub fn with_filtered(mut self, filtered: Vec<Candidate>) -> Self {
        self.filtered = filtered;
        self
    }

    /// Unfiltered results for one specific query
    pub fn with_query(mut self, query: &str, results: Vec<Candidate>) -> Self {
        self.by_query.insert(query.to_string(), results);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&DateRange>,
    ) -> Result<Vec<Candidate>> {
        self.calls.lock().unwrap().push(SearchCall {
            query: query.to_string(),
            top_k,
            filter: filter.copied(),
        });

        if self.fail {
            return Err(AgentError::SearchError("empty_corpus".to_string()));
        }

        let source = match filter {
            Some(_) => &self.filtered,
            None => self.by_query.get(query).unwrap_or(&self.unfiltered),
        };
        Ok(source.iter().take(top_k).cloned().collect())
    }
}

/// Candidate with predictable fields derived from `id`
pub fn candidate(id: &str, date: &str, score: f64) -> Candidate {
    Candidate {
        chunk_id: format!("{}-{}", id, "a1b2c3d4e5f6"),
        document_name: format!("FOMC {}", id),
        document_date: date.to_string(),
        document_id: format!("doc-{}", id),
        section_header: "Policy Decision".to_string(),
        chunk_text: format!("The Committee discussed {} in detail. ", id).repeat(10),
        relevance_score: score,
        rerank_score: None,
    }
}

pub const RETRIEVE: &str =
    r#"{"needs_retrieval": true, "date_start": null, "date_end": null, "top_k_hint": null}"#;

pub const DECEMBER_2024: &str = r#"{"needs_retrieval": true, "date_start": "2024-12", "date_end": "2024-12", "top_k_hint": null}"#;

pub const NO_RETRIEVAL: &str =
    r#"{"needs_retrieval": false, "date_start": null, "date_end": null, "top_k_hint": null}"#;
