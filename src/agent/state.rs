//! Workflow state machine
//!
//! Deterministic finite state machine over the stages of one request:
//! - Safety: no stage is reachable except through a listed edge
//! - Liveness: every path ends in Done
//! - Boundedness: the only cycle (Reformulate → Search) is gated by the
//!   reformulation budget in [`route_after_confidence`]

use crate::errors::{AgentError, Result};
use crate::rag::confidence::ConfidenceLevel;
use serde::{Deserialize, Serialize};

/// Workflow stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStage {
    /// Entry - classify the question
    Triage,

    /// Run retrieval with the effective query
    Search,

    /// Score the retrieved evidence
    EvaluateConfidence,

    /// Rewrite the query after weak evidence
    Reformulate,

    /// Generate a grounded answer
    Synthesize,

    /// Check citations against evidence
    Validate,

    /// Render the final text
    Respond,

    /// Terminal
    Done,
}

/// Events that trigger stage transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageEvent {
    /// Triage decided the corpus must be searched
    RetrievalNeeded,

    /// Triage decided no search is needed
    RetrievalSkipped,

    /// Candidates retrieved
    SearchComplete,

    /// Confidence high or medium
    EvidenceSufficient,

    /// Confidence low with reformulation budget left
    EvidenceWeak,

    /// Confidence insufficient, or low with budget spent
    EvidenceExhausted,

    /// New query produced
    ReformulationComplete,

    /// Reformulation call failed; answer with current evidence
    ReformulationFailed,

    /// Answer text produced
    SynthesisComplete,

    /// Citations checked
    ValidationComplete,

    /// Final text rendered
    ResponseEmitted,
}

impl WorkflowStage {
    /// Entry stage of every request
    pub const ENTRY: WorkflowStage = WorkflowStage::Triage;

    /// Check if this is a terminal stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Done)
    }

    /// Attempt stage transition with validation
    ///
    /// Valid transitions (12 edges):
    /// 1.  Triage             → Search             (on: RetrievalNeeded)
    /// 2.  Triage             → Respond            (on: RetrievalSkipped)
    /// 3.  Search             → EvaluateConfidence (on: SearchComplete)
    /// 4.  EvaluateConfidence → Synthesize         (on: EvidenceSufficient)
    /// 5.  EvaluateConfidence → Reformulate        (on: EvidenceWeak)
    /// 6.  EvaluateConfidence → Respond            (on: EvidenceExhausted)
    /// 7.  Reformulate        → Search             (on: ReformulationComplete)
    /// 8.  Reformulate        → Respond            (on: ReformulationFailed)
    /// 9.  Synthesize         → Validate           (on: SynthesisComplete)
    /// 10. Validate           → Respond            (on: ValidationComplete)
    /// 11. Respond            → Done               (on: ResponseEmitted)
    /// 12. Done               → Done               (terminal state)
    pub fn transition(&self, event: StageEvent) -> Result<WorkflowStage> {
        use StageEvent::*;
        use WorkflowStage::*;

        let next_stage = match (self, event) {
            (Triage, RetrievalNeeded) => Search,
            (Triage, RetrievalSkipped) => Respond,

            (Search, SearchComplete) => EvaluateConfidence,

            (EvaluateConfidence, EvidenceSufficient) => Synthesize,
            (EvaluateConfidence, EvidenceWeak) => Reformulate,
            (EvaluateConfidence, EvidenceExhausted) => Respond,

            (Reformulate, ReformulationComplete) => Search,
            (Reformulate, ReformulationFailed) => Respond,

            (Synthesize, SynthesisComplete) => Validate,

            (Validate, ValidationComplete) => Respond,

            (Respond, ResponseEmitted) => Done,

            // Terminal state (self-loop)
            (Done, _) => Done,

            (from, event) => {
                return Err(AgentError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next_stage)
    }

    /// Get all valid events from this stage
    pub fn valid_events(&self) -> Vec<StageEvent> {
        use StageEvent::*;
        use WorkflowStage::*;

        match self {
            Triage => vec![RetrievalNeeded, RetrievalSkipped],
            Search => vec![SearchComplete],
            EvaluateConfidence => vec![EvidenceSufficient, EvidenceWeak, EvidenceExhausted],
            Reformulate => vec![ReformulationComplete, ReformulationFailed],
            Synthesize => vec![SynthesisComplete],
            Validate => vec![ValidationComplete],
            Respond => vec![ResponseEmitted],
            Done => vec![],
        }
    }

    /// Human-readable stage name
    pub fn display_name(&self) -> &'static str {
        match self {
            WorkflowStage::Triage => "Assessing query",
            WorkflowStage::Search => "Searching corpus",
            WorkflowStage::EvaluateConfidence => "Evaluating confidence",
            WorkflowStage::Reformulate => "Reformulating query",
            WorkflowStage::Synthesize => "Synthesizing answer",
            WorkflowStage::Validate => "Validating citations",
            WorkflowStage::Respond => "Formatting response",
            WorkflowStage::Done => "Completed",
        }
    }
}

/// Routing after triage
pub fn route_after_triage(needs_retrieval: bool) -> StageEvent {
    if needs_retrieval {
        StageEvent::RetrievalNeeded
    } else {
        StageEvent::RetrievalSkipped
    }
}

/// Routing after confidence evaluation.
///
/// Low confidence reformulates only while `attempts < max_reformulations`;
/// afterwards the workflow proceeds to Respond whatever the confidence.
pub fn route_after_confidence(
    confidence: ConfidenceLevel,
    attempts: u32,
    max_reformulations: u32,
) -> StageEvent {
    if confidence.is_answerable() {
        StageEvent::EvidenceSufficient
    } else if confidence == ConfidenceLevel::Low && attempts < max_reformulations {
        StageEvent::EvidenceWeak
    } else {
        StageEvent::EvidenceExhausted
    }
}
