//! Question-answering workflow
//!
//! Stage machine, per-request state, the individual stages and the engine
//! that drives them.

pub mod citations;
pub mod orchestrator;
pub mod reformulate;
pub mod respond;
pub mod state;
pub mod synthesis;
pub mod triage;
pub mod workflow;

// Re-export commonly used types
pub use citations::CitationValidator;
pub use orchestrator::{EngineConfig, StageObserver, WorkflowEngine};
pub use reformulate::QueryReformulator;
pub use respond::ResponseFormatter;
pub use state::{route_after_confidence, route_after_triage, StageEvent, WorkflowStage};
pub use synthesis::{extract_source_indices, AnswerSynthesizer, Synthesis};
pub use triage::{parse_triage_response, QueryTriage, TriageDecision};
pub use workflow::{WorkflowOutcome, WorkflowState};
