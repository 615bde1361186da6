// Two-pass retrieval with filtered-first merge
use futures_util::future::try_join;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{with_timeout, Result};
use crate::rag::reranking::Reranker;
use crate::search::SearchProvider;
use crate::types::{Candidate, DateRange, MetadataHints};

/// Retrieval sizing parameters
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Results per pass when no hint is given
    pub default_top_k: usize,
    /// Over-fetch multiplier applied when a reranker is present
    pub overfetch_factor: usize,
    /// Deadline for each search call
    pub search_timeout: Duration,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            overfetch_factor: 3,
            search_timeout: Duration::from_secs(30),
        }
    }
}

impl RetrievalParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_top_k: config.retrieval.default_top_k,
            overfetch_factor: config.retrieval.overfetch_factor.max(1),
            search_timeout: config.search.request_timeout(),
        }
    }
}

/// Executes searches against the provider and merges the passes
pub struct RetrievalCoordinator<'a> {
    search: &'a dyn SearchProvider,
    reranker: Option<&'a dyn Reranker>,
    params: RetrievalParams,
}

impl<'a> RetrievalCoordinator<'a> {
    pub fn new(search: &'a dyn SearchProvider, params: RetrievalParams) -> Self {
        Self {
            search,
            reranker: None,
            params,
        }
    }

    pub fn with_reranker(mut self, reranker: &'a dyn Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Retrieve candidates for `query`.
    ///
    /// With a date range, a filtered and an unfiltered pass run
    /// concurrently and are merged filtered-first. Otherwise a single
    /// unfiltered pass is returned. Search failures propagate.
    pub async fn retrieve(&self, query: &str, hints: &MetadataHints) -> Result<Vec<Candidate>> {
        let top_k = hints.top_k_or(self.params.default_top_k);

        match &hints.date_range {
            Some(range) => {
                let (filtered, unfiltered) = try_join(
                    self.run_pass(query, top_k, Some(range)),
                    self.run_pass(query, top_k, None),
                )
                .await?;

                info!(
                    filtered = filtered.len(),
                    unfiltered = unfiltered.len(),
                    date_start = %range.start_iso(),
                    date_end = %range.end_iso(),
                    "Two-pass retrieval complete"
                );

                Ok(merge_passes(filtered, unfiltered, top_k))
            }
            None => {
                let results = self.run_pass(query, top_k, None).await?;
                info!(results = results.len(), "Single-pass retrieval complete");
                Ok(merge_passes(Vec::new(), results, top_k))
            }
        }
    }

    async fn run_pass(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&DateRange>,
    ) -> Result<Vec<Candidate>> {
        let fetch_k = match self.reranker {
            Some(_) => top_k.saturating_mul(self.params.overfetch_factor),
            None => top_k,
        };
        let operation = if filter.is_some() {
            "filtered search"
        } else {
            "search"
        };

        debug!(query, fetch_k, filtered = filter.is_some(), "Issuing search");

        let candidates: Vec<Candidate> = with_timeout(
            operation,
            self.params.search_timeout,
            self.search.search(query, fetch_k, filter),
        )
        .await?
        .into_iter()
        .map(Candidate::normalized)
        .collect();

        match self.reranker {
            Some(reranker) => {
                let mut reranked = reranker.rerank(query, candidates, Some(top_k)).await?;
                reranked.truncate(top_k);
                Ok(reranked)
            }
            None => Ok(candidates),
        }
    }
}

/// Merge two ranked passes: `filtered` first in its own order, then
/// `unfiltered` entries not already present, truncated to `top_k`.
///
/// Identity is `chunk_id`; duplicates inside either pass collapse to
/// their first occurrence.
pub fn merge_passes(
    filtered: Vec<Candidate>,
    unfiltered: Vec<Candidate>,
    top_k: usize,
) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(top_k.min(filtered.len() + unfiltered.len()));

    for candidate in filtered.into_iter().chain(unfiltered) {
        if merged.len() >= top_k {
            break;
        }
        if seen.insert(candidate.chunk_id.clone()) {
            merged.push(candidate);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use crate::rag::reranking::LexicalReranker;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn candidate(id: &str, score: f64) -> Candidate {
        Candidate {
            chunk_id: id.to_string(),
            document_name: format!("doc {}", id),
            document_date: "2024-12-18".to_string(),
            document_id: "d".to_string(),
            section_header: "s".to_string(),
            chunk_text: format!("text {}", id),
            relevance_score: score,
            rerank_score: None,
        }
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.chunk_id.as_str()).collect()
    }

    /// Returns fixed results per pass and records each call
    struct FixedSearch {
        filtered: Vec<Candidate>,
        unfiltered: Vec<Candidate>,
        calls: Mutex<Vec<(usize, bool)>>,
    }

    impl FixedSearch {
        fn new(filtered: Vec<Candidate>, unfiltered: Vec<Candidate>) -> Self {
            Self {
                filtered,
                unfiltered,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for FixedSearch {
        async fn search(
            &self,
            _query: &str,
            top_k: usize,
            filter: Option<&DateRange>,
        ) -> Result<Vec<Candidate>> {
            self.calls.lock().unwrap().push((top_k, filter.is_some()));
            let source = if filter.is_some() {
                &self.filtered
            } else {
                &self.unfiltered
            };
            Ok(source.iter().take(top_k).cloned().collect())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(
            &self,
            _query: &str,
            _top_k: usize,
            _filter: Option<&DateRange>,
        ) -> Result<Vec<Candidate>> {
            Err(AgentError::SearchError("index offline".to_string()))
        }
    }

    struct SlowSearch;

    #[async_trait]
    impl SearchProvider for SlowSearch {
        async fn search(
            &self,
            _query: &str,
            _top_k: usize,
            _filter: Option<&DateRange>,
        ) -> Result<Vec<Candidate>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_merge_filtered_first() {
        let merged = merge_passes(
            vec![candidate("f1", 0.5), candidate("shared", 0.4)],
            vec![candidate("u1", 0.9), candidate("shared", 0.9), candidate("u2", 0.8)],
            10,
        );
        assert_eq!(ids(&merged), vec!["f1", "shared", "u1", "u2"]);
        // filtered copy wins
        assert_eq!(merged[1].relevance_score, 0.4);
    }

    #[test]
    fn test_merge_truncates() {
        let merged = merge_passes(
            vec![candidate("f1", 0.5), candidate("f2", 0.5)],
            vec![candidate("u1", 0.9)],
            2,
        );
        assert_eq!(ids(&merged), vec!["f1", "f2"]);
    }

    #[test]
    fn test_merge_collapses_duplicates_within_pass() {
        let merged = merge_passes(
            vec![candidate("a", 0.5), candidate("a", 0.4)],
            vec![candidate("b", 0.3), candidate("b", 0.2)],
            10,
        );
        assert_eq!(ids(&merged), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_single_pass_without_dates() {
        let search = FixedSearch::new(vec![], vec![candidate("u1", 0.7), candidate("u2", 0.6)]);
        let coordinator = RetrievalCoordinator::new(&search, RetrievalParams::default());

        let results = coordinator
            .retrieve("inflation", &MetadataHints::none())
            .await
            .unwrap();

        assert_eq!(ids(&results), vec!["u1", "u2"]);
        assert_eq!(*search.calls.lock().unwrap(), vec![(10, false)]);
    }

    #[tokio::test]
    async fn test_two_passes_with_dates() {
        let search = FixedSearch::new(
            vec![candidate("dec", 0.3)],
            vec![candidate("nov", 0.8), candidate("dec", 0.3)],
        );
        let coordinator = RetrievalCoordinator::new(&search, RetrievalParams::default());
        let hints = MetadataHints {
            date_range: DateRange::month(2024, 12),
            top_k_hint: Some(5),
        };

        let results = coordinator.retrieve("inflation", &hints).await.unwrap();

        assert_eq!(ids(&results), vec!["dec", "nov"]);
        let mut calls = search.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec![(5, false), (5, true)]);
    }

    #[tokio::test]
    async fn test_scores_clamped_at_boundary() {
        let search = FixedSearch::new(vec![], vec![candidate("hot", 1.7), candidate("cold", -0.2)]);
        let coordinator = RetrievalCoordinator::new(&search, RetrievalParams::default());

        let results = coordinator
            .retrieve("q", &MetadataHints::none())
            .await
            .unwrap();

        assert_eq!(results[0].relevance_score, 1.0);
        assert_eq!(results[1].relevance_score, 0.0);
    }

    #[tokio::test]
    async fn test_reranker_overfetches_then_truncates() {
        let unfiltered: Vec<Candidate> = (0..9).map(|i| candidate(&format!("c{}", i), 0.5)).collect();
        let search = FixedSearch::new(vec![], unfiltered);
        let reranker = LexicalReranker::new();
        let params = RetrievalParams {
            default_top_k: 3,
            ..RetrievalParams::default()
        };
        let coordinator = RetrievalCoordinator::new(&search, params).with_reranker(&reranker);

        let results = coordinator
            .retrieve("q", &MetadataHints::none())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|c| c.rerank_score.is_some()));
        assert_eq!(*search.calls.lock().unwrap(), vec![(9, false)]);
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let coordinator = RetrievalCoordinator::new(&FailingSearch, RetrievalParams::default());
        let result = coordinator.retrieve("q", &MetadataHints::none()).await;
        assert!(matches!(result, Err(AgentError::SearchError(_))));
    }

    #[tokio::test]
    async fn test_search_timeout() {
        let params = RetrievalParams {
            search_timeout: Duration::from_millis(20),
            ..RetrievalParams::default()
        };
        let coordinator = RetrievalCoordinator::new(&SlowSearch, params);
        let result = coordinator.retrieve("q", &MetadataHints::none()).await;
        assert!(matches!(result, Err(AgentError::Timeout { .. })));
    }
}
