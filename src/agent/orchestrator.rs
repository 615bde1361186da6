//! Workflow engine - main coordinator
//!
//! Drives one request through the stage machine, coordinating:
//! - Query triage
//! - Retrieval and confidence scoring
//! - The bounded reformulation loop
//! - Synthesis, citation validation and response rendering

use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};

use crate::agent::citations::CitationValidator;
use crate::agent::reformulate::QueryReformulator;
use crate::agent::respond::ResponseFormatter;
use crate::agent::state::{route_after_confidence, route_after_triage, StageEvent, WorkflowStage};
use crate::agent::synthesis::AnswerSynthesizer;
use crate::agent::triage::QueryTriage;
use crate::agent::workflow::{WorkflowOutcome, WorkflowState};
use crate::config::{Config, MAX_REFORMULATION_LIMIT};
use crate::errors::{AgentError, Result};
use crate::llm::LanguageModel;
use crate::rag::confidence::{ConfidenceClassifier, ConfidenceThresholds};
use crate::rag::reranking::Reranker;
use crate::rag::retrieval::{RetrievalCoordinator, RetrievalParams};
use crate::search::SearchProvider;

/// Workflow engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for each model call
    pub llm_timeout: Duration,

    pub retrieval: RetrievalParams,

    pub thresholds: ConfidenceThresholds,

    /// Reformulation budget, capped at MAX_REFORMULATION_LIMIT
    pub max_reformulations: u32,

    /// Citation excerpt length in characters
    pub excerpt_chars: usize,

    /// Candidate preview length for reformulation prompts
    pub preview_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(60),
            retrieval: RetrievalParams::default(),
            thresholds: ConfidenceThresholds::default(),
            max_reformulations: MAX_REFORMULATION_LIMIT,
            excerpt_chars: 200,
            preview_chars: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            llm_timeout: config.llm.timeout(),
            retrieval: RetrievalParams::from_config(config),
            thresholds: config.confidence,
            max_reformulations: config.workflow.max_reformulations,
            excerpt_chars: config.workflow.excerpt_chars,
            preview_chars: config.workflow.preview_chars,
        }
    }
}

/// Callback invoked as each stage starts
pub type StageObserver<'a> = &'a (dyn Fn(WorkflowStage) + Send + Sync);

/// Confidence-driven question answering over the corpus
pub struct WorkflowEngine<'a> {
    llm: &'a dyn LanguageModel,
    on_stage: Option<StageObserver<'a>>,
    retrieval: RetrievalCoordinator<'a>,
    classifier: ConfidenceClassifier,
    validator: CitationValidator,
    formatter: ResponseFormatter,
    config: EngineConfig,
}

impl<'a> WorkflowEngine<'a> {
    /// Create a new engine over borrowed collaborators
    pub fn new(
        llm: &'a dyn LanguageModel,
        search: &'a dyn SearchProvider,
        mut config: EngineConfig,
    ) -> Self {
        config.max_reformulations = config.max_reformulations.min(MAX_REFORMULATION_LIMIT);

        Self {
            llm,
            on_stage: None,
            retrieval: RetrievalCoordinator::new(search, config.retrieval.clone()),
            classifier: ConfidenceClassifier::new(config.thresholds),
            validator: CitationValidator::new(config.excerpt_chars),
            formatter: ResponseFormatter::new(),
            config,
        }
    }

    /// Rerank every retrieval pass
    pub fn with_reranker(mut self, reranker: &'a dyn Reranker) -> Self {
        self.retrieval = self.retrieval.with_reranker(reranker);
        self
    }

    /// Report each stage as it starts, e.g. to label a progress spinner
    pub fn with_stage_observer(mut self, observer: StageObserver<'a>) -> Self {
        self.on_stage = Some(observer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answer one question.
    ///
    /// Returns a grounded answer or the insufficient-evidence message.
    /// Only search failures and invalid input surface as errors.
    pub async fn run(&self, query: &str) -> Result<WorkflowOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::InvalidQuery(
                "question must not be empty".to_string(),
            ));
        }

        let mut state = WorkflowState::new(query);
        let span = info_span!("request", request_id = %state.request_id);

        async {
            let mut stage = WorkflowStage::ENTRY;

            while !stage.is_terminal() {
                state.stages_visited.push(stage);
                if let Some(observe) = self.on_stage {
                    observe(stage);
                }
                let event = self.step(stage, &mut state).await?;
                let next = stage.transition(event)?;
                info!(from = ?stage, to = ?next, stage = next.display_name(), "Stage transition");
                stage = next;
            }

            info!(
                confidence = %state.confidence,
                citations = state.citations.len(),
                reformulations = state.reformulation_attempts(),
                "Request complete"
            );
            Ok::<(), AgentError>(())
        }
        .instrument(span)
        .await?;

        Ok(state.into_outcome())
    }

    /// Execute `stage` against `state` and report the routing event
    async fn step(&self, stage: WorkflowStage, state: &mut WorkflowState) -> Result<StageEvent> {
        match stage {
            WorkflowStage::Triage => {
                let decision = QueryTriage::new(self.llm, self.config.llm_timeout)
                    .classify(&state.query)
                    .await;
                state.needs_retrieval = decision.needs_retrieval;
                state.hints = decision.hints;
                Ok(route_after_triage(state.needs_retrieval))
            }

            WorkflowStage::Search => {
                state.candidates = self
                    .retrieval
                    .retrieve(state.effective_query(), &state.hints)
                    .await?;
                Ok(StageEvent::SearchComplete)
            }

            WorkflowStage::EvaluateConfidence => {
                state.confidence = self.classifier.evaluate(&state.candidates);
                Ok(route_after_confidence(
                    state.confidence,
                    state.reformulation_attempts(),
                    self.config.max_reformulations,
                ))
            }

            WorkflowStage::Reformulate => {
                let reformulator = QueryReformulator::new(
                    self.llm,
                    self.config.llm_timeout,
                    self.config.preview_chars,
                );
                match reformulator
                    .reformulate(&state.query, &state.candidates)
                    .await
                {
                    Ok(rewritten) => {
                        info!(query = %rewritten, "Reformulated query");
                        state.record_reformulation(rewritten);
                        Ok(StageEvent::ReformulationComplete)
                    }
                    Err(e) => {
                        warn!(error = %e, "Reformulation failed, answering with current evidence");
                        Ok(StageEvent::ReformulationFailed)
                    }
                }
            }

            WorkflowStage::Synthesize => {
                let synthesizer = AnswerSynthesizer::new(
                    self.llm,
                    self.config.llm_timeout,
                    self.config.excerpt_chars,
                );
                match synthesizer.synthesize(&state.query, &state.candidates).await {
                    Ok(synthesis) => {
                        state.answer = Some(synthesis.answer);
                        state.citations = synthesis.citations;
                    }
                    Err(e) => {
                        warn!(error = %e, "Synthesis failed");
                        state.answer = None;
                        state.citations.clear();
                    }
                }
                Ok(StageEvent::SynthesisComplete)
            }

            WorkflowStage::Validate => {
                let citations = std::mem::take(&mut state.citations);
                state.citations = self.validator.validate(citations, &state.candidates);
                Ok(StageEvent::ValidationComplete)
            }

            WorkflowStage::Respond => {
                self.formatter.render(state);
                Ok(StageEvent::ResponseEmitted)
            }

            WorkflowStage::Done => Err(AgentError::InvalidTransition {
                from: format!("{:?}", stage),
                event: "step".to_string(),
                reason: "terminal stage has no work".to_string(),
            }),
        }
    }
}
