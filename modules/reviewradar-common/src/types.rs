use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured identity derived from a raw product title.
///
/// Derived deterministically from the title plus an optional brand hint,
/// immutable once created, and scoped to a single pipeline invocation —
/// it is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductIdentity {
    pub raw_title: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub edition: Option<String>,
    /// Lowercased, stopword-stripped, deduplicated title tokens.
    pub keywords: Vec<String>,
}

impl ProductIdentity {
    /// True when the title yielded nothing usable. Every gate must fail
    /// closed against such an identity.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The exact "model edition" phrase, when both parts exist.
    pub fn model_phrase(&self) -> Option<String> {
        match (&self.model, &self.edition) {
            (Some(m), Some(e)) => Some(format!("{m} {e}")),
            (Some(m), None) => Some(m.clone()),
            _ => None,
        }
    }
}

/// Which pipeline branch produced a candidate review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSource {
    Discussion,
    Forum,
    Retailer,
    Shopping,
}

impl ReviewSource {
    /// Fixed merge order for the orchestrator. Results are concatenated in
    /// this order regardless of task completion order, for determinism.
    pub const PRIORITY_ORDER: [ReviewSource; 4] = [
        ReviewSource::Shopping,
        ReviewSource::Retailer,
        ReviewSource::Discussion,
        ReviewSource::Forum,
    ];

    /// Near-duplicate similarity threshold for this source. Shopping results
    /// are higher-trust and lower-noise, so the bar for calling two texts
    /// duplicates is tighter there.
    pub fn near_dup_threshold(&self) -> f64 {
        match self {
            ReviewSource::Shopping => 0.95,
            _ => 0.90,
        }
    }
}

impl std::fmt::Display for ReviewSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewSource::Discussion => write!(f, "discussion"),
            ReviewSource::Forum => write!(f, "forum"),
            ReviewSource::Retailer => write!(f, "retailer"),
            ReviewSource::Shopping => write!(f, "shopping"),
        }
    }
}

impl std::str::FromStr for ReviewSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discussion" => Ok(ReviewSource::Discussion),
            "forum" => Ok(ReviewSource::Forum),
            "retailer" => Ok(ReviewSource::Retailer),
            "shopping" => Ok(ReviewSource::Shopping),
            other => Err(format!(
                "Unknown source: {other}. Supported: discussion, forum, retailer, shopping"
            )),
        }
    }
}

/// One unvalidated review record, before AI normalization.
///
/// Content is non-empty and at least the fetcher's minimum length by
/// construction. Records are never mutated after creation — the
/// deduplicator discards losers, it never edits survivors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReview {
    /// Source-scoped external id (e.g. "reddit_<thread>_<reply>").
    pub external_id: String,
    pub author: String,
    /// 0-5 star rating where the source carries one.
    pub rating: Option<f32>,
    pub title: String,
    pub content: String,
    pub source: ReviewSource,
    pub source_url: String,
    /// Relevance confidence in [0, 1], stamped by the gate that accepted it.
    pub relevance: f32,
    pub fetched_at: DateTime<Utc>,
}

/// Per-fetcher cap on queries, pages, interaction rounds, and wall time.
///
/// Budget expiry is the expected outcome of a slow source, not an error:
/// a fetcher checks `expired` at its next natural checkpoint (next query,
/// next page, next round) and returns whatever it already collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchBudget {
    pub max_queries: usize,
    pub max_pages: usize,
    pub max_rounds: u32,
    pub time_limit: Duration,
}

impl FetchBudget {
    pub fn expired(&self, started: Instant) -> bool {
        started.elapsed() >= self.time_limit
    }
}

impl Default for FetchBudget {
    fn default() -> Self {
        Self {
            max_queries: 4,
            max_pages: 15,
            max_rounds: 5,
            time_limit: Duration::from_secs(60),
        }
    }
}
