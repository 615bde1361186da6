// Retrieval coordination: one- or two-pass search with deterministic merge
pub mod coordinator;

pub use coordinator::{merge_passes, RetrievalCoordinator, RetrievalParams};
