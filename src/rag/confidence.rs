// Confidence scoring for retrieved evidence
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{AgentError, Result};
use crate::types::Candidate;

/// Ordinal judgment of retrieval adequacy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Insufficient,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Insufficient => "insufficient",
        }
    }

    /// Evidence good enough to synthesize an answer from
    pub fn is_answerable(&self) -> bool {
        matches!(self, ConfidenceLevel::High | ConfidenceLevel::Medium)
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bounds for each level, tied to the embedding model in use.
///
/// Defaults are calibrated for all-MiniLM-L6-v2 cosine similarity, where
/// relevant FOMC passages typically score 0.55-0.70.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.55,
            medium: 0.40,
            low: 0.25,
        }
    }
}

impl ConfidenceThresholds {
    /// Thresholds must be strictly descending inside (0, 1]
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| v > 0.0 && v <= 1.0;
        if !(in_range(self.high) && in_range(self.medium) && in_range(self.low)) {
            return Err(AgentError::ConfigError(
                "confidence thresholds must be within (0.0, 1.0]".to_string(),
            ));
        }
        if !(self.high > self.medium && self.medium > self.low) {
            return Err(AgentError::ConfigError(format!(
                "confidence thresholds must be strictly descending (high {} > medium {} > low {})",
                self.high, self.medium, self.low
            )));
        }
        Ok(())
    }
}

/// Maps aggregate relevance onto a [`ConfidenceLevel`]
#[derive(Debug, Clone, Default)]
pub struct ConfidenceClassifier {
    thresholds: ConfidenceThresholds,
}

impl ConfidenceClassifier {
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds }
    }

    /// Step function over a mean score
    pub fn classify(&self, mean_score: f64) -> ConfidenceLevel {
        let t = &self.thresholds;
        if mean_score >= t.high {
            ConfidenceLevel::High
        } else if mean_score >= t.medium {
            ConfidenceLevel::Medium
        } else if mean_score >= t.low {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Insufficient
        }
    }

    /// Classify a candidate set by its mean relevance
    pub fn evaluate(&self, candidates: &[Candidate]) -> ConfidenceLevel {
        self.classify(mean_relevance(candidates))
    }
}

/// Mean relevance score, 0 for an empty set
pub fn mean_relevance(candidates: &[Candidate]) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    let total: f64 = candidates.iter().map(|c| c.relevance_score).sum();
    total / candidates.len() as f64
}
