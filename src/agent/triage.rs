//! Query triage
//!
//! Asks the model whether a question needs the corpus at all and pulls
//! optional date and result-count hints out of its JSON reply. Triage never
//! fails a request: unparseable replies fall back to a lexical check and a
//! failed call defaults to retrieving without hints.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::with_timeout;
use crate::llm::LanguageModel;
use crate::types::{bounded_top_k_hint, DateRange, MetadataHints};

pub const TRIAGE_SYSTEM_PROMPT: &str = "You are a query classifier for an FOMC document retrieval system. \
Determine if the user's question requires searching FOMC documents, extract any temporal date range, \
and estimate how many search results are needed.\n\n\
Respond with ONLY a JSON object (no markdown, no explanation):\n\
{\"needs_retrieval\": true/false, \"date_start\": \"YYYY-MM-DD\" or null, \
\"date_end\": \"YYYY-MM-DD\" or null, \"top_k_hint\": integer or null}\n\n\
Rules:\n\
- Fed policy, interest rates, inflation, economic outlook, FOMC meetings: needs_retrieval true\n\
- Greetings, general knowledge, non-FOMC topics: needs_retrieval false\n\
- A specific month (e.g. 'December 2024'): first and last day of that month\n\
- A year without a month: the full year\n\
- No temporal signal: both dates null\n\
- top_k_hint: single meeting null, 2-3 meetings 15, a full year 30, multi-year 40-50";

/// Triage result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageDecision {
    pub needs_retrieval: bool,
    pub hints: MetadataHints,
}

impl TriageDecision {
    /// Used when the model could not be consulted
    pub fn retrieve_without_hints() -> Self {
        Self {
            needs_retrieval: true,
            hints: MetadataHints::none(),
        }
    }
}

/// LLM-backed query classifier
pub struct QueryTriage<'a> {
    llm: &'a dyn LanguageModel,
    timeout: Duration,
}

impl<'a> QueryTriage<'a> {
    pub fn new(llm: &'a dyn LanguageModel, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn classify(&self, query: &str) -> TriageDecision {
        match with_timeout("triage", self.timeout, self.llm.complete(TRIAGE_SYSTEM_PROMPT, query))
            .await
        {
            Ok(raw) => parse_triage_response(&raw),
            Err(e) => {
                warn!(error = %e, "Triage call failed, defaulting to retrieval");
                TriageDecision::retrieve_without_hints()
            }
        }
    }
}

/// Interpret a raw triage reply.
///
/// JSON objects yield `needs_retrieval` plus hints. Anything else falls
/// back to checking the lowercased raw text for "yes" or "true", which
/// misreads negatives such as "not true".
pub fn parse_triage_response(raw: &str) -> TriageDecision {
    let body = strip_code_fences(raw);

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => {
            let needs_retrieval = fields.get("needs_retrieval").map_or(false, truthy);

            let date_range = match (
                fields.get("date_start").and_then(Value::as_str),
                fields.get("date_end").and_then(Value::as_str),
            ) {
                (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => {
                    let range = DateRange::resolve(start, end);
                    if range.is_none() {
                        debug!(start, end, "Ignoring unparseable date hints");
                    }
                    range
                }
                _ => None,
            };

            let top_k_hint =
                bounded_top_k_hint(fields.get("top_k_hint").and_then(Value::as_u64));

            TriageDecision {
                needs_retrieval,
                hints: MetadataHints {
                    date_range,
                    top_k_hint,
                },
            }
        }
        _ => {
            debug!("Triage reply is not a JSON object, using lexical fallback");
            lexical_fallback(raw)
        }
    }
}

/// Remove a surrounding ```` ``` ```` or ```` ```json ```` fence
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start();
    rest.strip_suffix("```").unwrap_or(rest).trim_end()
}

fn lexical_fallback(raw: &str) -> TriageDecision {
    let lowered = raw.to_lowercase();
    TriageDecision {
        needs_retrieval: lowered.contains("yes") || lowered.contains("true"),
        hints: MetadataHints::none(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}
