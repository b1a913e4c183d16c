use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::Claude;
use reviewradar_common::CandidateReview;

/// Which summary shape the normalizer should produce. Community text gets
/// a sentiment plus praise/complaint lists, store reviews get an average
/// rating plus a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationContext {
    Community,
    Store,
}

impl std::fmt::Display for NormalizationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizationContext::Community => write!(f, "community"),
            NormalizationContext::Store => write!(f, "store"),
        }
    }
}

/// A candidate that survived validation, with the validator's confidence.
/// The underlying review is carried unmodified.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedReview {
    pub review: CandidateReview,
    pub validation_confidence: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewSummary {
    pub sentiment: Option<String>,
    pub top_praise: Vec<String>,
    pub top_complaints: Vec<String>,
    pub average_rating: Option<f32>,
    pub trust_score: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct NormalizedBatch {
    pub reviews: Vec<NormalizedReview>,
    /// How many input candidates the validator filtered out.
    pub filtered_count: usize,
    pub summary: ReviewSummary,
}

/// The downstream AI validation step. The pipeline treats this as an opaque
/// collaborator: candidates in, a validated subset plus summary out.
#[async_trait]
pub trait ReviewNormalizer: Send + Sync {
    async fn normalize(
        &self,
        reviews: &[CandidateReview],
        context: NormalizationContext,
    ) -> Result<NormalizedBatch>;
}

/// Pass-through normalizer: keeps everything at full confidence with an
/// empty summary.
pub struct NoopNormalizer;

#[async_trait]
impl ReviewNormalizer for NoopNormalizer {
    async fn normalize(
        &self,
        reviews: &[CandidateReview],
        _context: NormalizationContext,
    ) -> Result<NormalizedBatch> {
        Ok(NormalizedBatch {
            reviews: reviews
                .iter()
                .cloned()
                .map(|review| NormalizedReview {
                    review,
                    validation_confidence: 1.0,
                })
                .collect(),
            filtered_count: 0,
            summary: ReviewSummary::default(),
        })
    }
}

// --- Claude wire types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct ValidationWire {
    /// Indices of input reviews worth keeping, with per-review confidence.
    reviews: Vec<ReviewValidationWire>,
    summary: SummaryWire,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReviewValidationWire {
    /// Zero-based index into the submitted batch.
    index: usize,
    /// Confidence that this is a genuine first-hand review, 0 to 1.
    validation_confidence: f32,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SummaryWire {
    /// Overall sentiment: "positive", "mixed", or "negative".
    sentiment: Option<String>,
    #[serde(default)]
    top_praise: Vec<String>,
    #[serde(default)]
    top_complaints: Vec<String>,
    /// Mean star rating across kept reviews, when ratings exist.
    average_rating: Option<f32>,
    /// How trustworthy the review set looks overall, 0 to 1.
    trust_score: Option<f32>,
}

/// Per-review content cap in the prompt. Keeps a 60-review batch well under
/// the context limit.
const PROMPT_CONTENT_CAP: usize = 1200;

/// Production normalizer: one structured-output Claude call per batch.
pub struct ClaudeNormalizer {
    ai: Claude,
}

impl ClaudeNormalizer {
    pub fn new(ai: Claude) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl ReviewNormalizer for ClaudeNormalizer {
    async fn normalize(
        &self,
        reviews: &[CandidateReview],
        context: NormalizationContext,
    ) -> Result<NormalizedBatch> {
        if reviews.is_empty() {
            return Ok(NormalizedBatch {
                reviews: Vec::new(),
                filtered_count: 0,
                summary: ReviewSummary::default(),
            });
        }

        let system = system_prompt(context);
        let user = batch_prompt(reviews);

        let wire: ValidationWire = self.ai.extract(system, user).await?;
        let batch = apply_validation(reviews, wire);

        info!(
            context = %context,
            kept = batch.reviews.len(),
            filtered = batch.filtered_count,
            "Review normalization complete"
        );
        Ok(batch)
    }
}

fn system_prompt(context: NormalizationContext) -> String {
    let summary_shape = match context {
        NormalizationContext::Community => {
            "a sentiment label (positive/mixed/negative) plus top_praise and \
             top_complaints lists"
        }
        NormalizationContext::Store => {
            "average_rating across kept reviews and a trust_score for the set"
        }
    };
    format!(
        "You validate scraped {context} product reviews. Keep only genuine \
         first-hand opinions about the product itself; drop spam, ads, \
         news, and off-topic text. For each kept review report its index \
         and a validation confidence between 0 and 1. Summarize the kept \
         set as {summary_shape}."
    )
}

fn batch_prompt(reviews: &[CandidateReview]) -> String {
    let mut prompt = String::from("Reviews:\n");
    for (i, review) in reviews.iter().enumerate() {
        let rating = review
            .rating
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "none".to_string());
        let content = ai_client::util::truncate_to_char_boundary(&review.content, PROMPT_CONTENT_CAP);
        prompt.push_str(&format!(
            "[{i}] source={} author={} rating={rating}\n{content}\n\n",
            review.source, review.author
        ));
    }
    prompt
}

/// Map the validator's index-referenced verdicts back onto the original
/// candidates. Out-of-range or repeated indices are dropped, confidences
/// are clamped, input order is preserved.
fn apply_validation(reviews: &[CandidateReview], wire: ValidationWire) -> NormalizedBatch {
    let mut kept: Vec<Option<f32>> = vec![None; reviews.len()];
    for verdict in wire.reviews {
        match kept.get_mut(verdict.index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(verdict.validation_confidence.clamp(0.0, 1.0));
            }
            Some(_) => warn!(index = verdict.index, "Duplicate validation index ignored"),
            None => warn!(index = verdict.index, "Out-of-range validation index ignored"),
        }
    }

    let normalized: Vec<NormalizedReview> = reviews
        .iter()
        .zip(kept)
        .filter_map(|(review, confidence)| {
            confidence.map(|validation_confidence| NormalizedReview {
                review: review.clone(),
                validation_confidence,
            })
        })
        .collect();

    NormalizedBatch {
        filtered_count: reviews.len() - normalized.len(),
        summary: ReviewSummary {
            sentiment: wire.summary.sentiment,
            top_praise: wire.summary.top_praise,
            top_complaints: wire.summary.top_complaints,
            average_rating: wire.summary.average_rating,
            trust_score: wire.summary.trust_score,
        },
        reviews: normalized,
    }
}
