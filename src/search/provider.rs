//! Collaborator traits for corpus access
//!
//! The engine never talks to a vector store directly. Search and document
//! lookup sit behind these traits so the MCP client, an in-process index or
//! a scripted test double can be swapped in.

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{Candidate, DateRange, Document};

/// Ranked passage search, optionally constrained to a date window
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return up to `top_k` candidates in rank order.
    ///
    /// Zero matches (including under a filter) is `Ok(vec![])`. Transport or
    /// backend failures must surface as errors.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&DateRange>,
    ) -> Result<Vec<Candidate>>;
}

/// Full-document retrieval by identifier
#[async_trait]
pub trait DocumentLookup: Send + Sync {
    /// `Ok(None)` when the id is unknown
    async fn get_document(&self, document_id: &str) -> Result<Option<Document>>;
}
