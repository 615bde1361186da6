//! Type definitions module
//!
//! Evidence, hint and citation types shared by retrieval and the workflow.

pub mod candidate;
pub mod citation;
pub mod hints;

// Re-export commonly used types
pub use candidate::{char_prefix, Candidate, Document};
pub use citation::Citation;
pub use hints::{bounded_top_k_hint, DateRange, MetadataHints, MAX_TOP_K_HINT};
