use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{info, warn};

use reviewradar_common::{CandidateReview, FetchBudget, ProductIdentity, ReviewSource};

use crate::dedup::Deduplicator;
use crate::fetchers::FetcherRegistry;
use crate::identity;
use crate::normalizer::{NormalizationContext, NormalizedBatch, ReviewNormalizer};

/// Sources fetched concurrently per run.
const FETCH_CONCURRENCY: usize = 4;

/// Counters for one aggregation run.
#[derive(Debug, Default)]
pub struct HarvestStats {
    pub per_source: Vec<(ReviewSource, usize)>,
    pub before_dedup: usize,
    pub after_dedup: usize,
    pub merged: usize,
    pub elapsed_secs: f64,
}

impl fmt::Display for HarvestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "harvest:")?;
        for (source, count) in &self.per_source {
            write!(f, " {source}={count}")?;
        }
        write!(
            f,
            " | raw={} deduped={} merged={} elapsed={:.1}s",
            self.before_dedup, self.after_dedup, self.merged, self.elapsed_secs
        )
    }
}

/// Runs the per-source fetchers concurrently and reduces their output to
/// one bounded, deduplicated candidate list.
///
/// A failing or empty source never aborts the run. Merge order is the fixed
/// source priority, not task completion order, so results are deterministic
/// given deterministic fetchers.
pub struct AggregationOrchestrator {
    registry: FetcherRegistry,
    max_merged: usize,
}

impl AggregationOrchestrator {
    pub fn new(registry: FetcherRegistry, max_merged: usize) -> Self {
        Self {
            registry,
            max_merged,
        }
    }

    pub async fn fetch_and_filter(
        &self,
        title: &str,
        brand_hint: Option<&str>,
        sources: &[ReviewSource],
        budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        let identity = identity::extract(title, brand_hint);
        self.fetch_identity(&identity, sources, budget).await
    }

    /// As fetch_and_filter, then hand the merged list to the normalizer.
    pub async fn fetch_filter_normalize(
        &self,
        title: &str,
        brand_hint: Option<&str>,
        sources: &[ReviewSource],
        budget: &FetchBudget,
        normalizer: &dyn ReviewNormalizer,
        context: NormalizationContext,
    ) -> Result<NormalizedBatch> {
        let reviews = self.fetch_and_filter(title, brand_hint, sources, budget).await;
        normalizer.normalize(&reviews, context).await
    }

    async fn fetch_identity(
        &self,
        identity: &ProductIdentity,
        sources: &[ReviewSource],
        budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        let started = Instant::now();

        let fetchers: Vec<_> = sources
            .iter()
            .filter_map(|source| match self.registry.get(*source) {
                Some(fetcher) => Some(fetcher),
                None => {
                    warn!(source = %source, "No fetcher registered, skipping source");
                    None
                }
            })
            .collect();

        let mut by_source: HashMap<ReviewSource, Vec<CandidateReview>> =
            stream::iter(fetchers)
                .map(|fetcher| async move {
                    (fetcher.source(), fetcher.fetch(identity, budget).await)
                })
                .buffer_unordered(FETCH_CONCURRENCY)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect();

        let mut stats = HarvestStats::default();
        let mut merged = Vec::new();
        for source in ReviewSource::PRIORITY_ORDER {
            if let Some(reviews) = by_source.remove(&source) {
                stats.per_source.push((source, reviews.len()));
                merged.extend(reviews);
            }
        }

        stats.before_dedup = merged.len();
        let mut deduped = Deduplicator::dedup(merged);
        stats.after_dedup = deduped.len();

        deduped.truncate(self.max_merged);
        stats.merged = deduped.len();
        stats.elapsed_secs = started.elapsed().as_secs_f64();

        info!(%stats, title = %identity.raw_title, "Aggregation complete");
        deduped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NoopNormalizer;
    use crate::testing::{make_review, MockFetcher};
    use std::sync::Arc;
    use std::time::Duration;

    const TITLE: &str = "Sony WH-1000XM5";

    fn all_sources() -> Vec<ReviewSource> {
        ReviewSource::PRIORITY_ORDER.to_vec()
    }

    #[tokio::test]
    async fn merge_follows_priority_not_completion_order() {
        // Shopping finishes last but must still lead the merged list.
        let registry = FetcherRegistry::new()
            .register(Arc::new(
                MockFetcher::new(
                    ReviewSource::Shopping,
                    vec![make_review("s1", "shopping reviewers love the case", ReviewSource::Shopping)],
                )
                .with_delay(Duration::from_millis(30)),
            ))
            .register(Arc::new(MockFetcher::new(
                ReviewSource::Forum,
                vec![make_review("f1", "forum post about pad wear over a year", ReviewSource::Forum)],
            )));
        let orchestrator = AggregationOrchestrator::new(registry, 60);

        let reviews = orchestrator
            .fetch_and_filter(TITLE, None, &all_sources(), &FetchBudget::default())
            .await;

        let ids: Vec<&str> = reviews.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "f1"]);
    }

    #[tokio::test]
    async fn duplicates_across_sources_collapse() {
        let same = "identical text posted to two different places about the xm5";
        let registry = FetcherRegistry::new()
            .register(Arc::new(MockFetcher::new(
                ReviewSource::Retailer,
                vec![make_review("r1", same, ReviewSource::Retailer)],
            )))
            .register(Arc::new(MockFetcher::new(
                ReviewSource::Forum,
                vec![make_review("f1", same, ReviewSource::Forum)],
            )));
        let orchestrator = AggregationOrchestrator::new(registry, 60);

        let reviews = orchestrator
            .fetch_and_filter(TITLE, None, &all_sources(), &FetchBudget::default())
            .await;

        // Retailer outranks forum, so its copy survives.
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].external_id, "r1");
    }

    #[tokio::test]
    async fn merged_list_is_capped() {
        // Contents must be pairwise dissimilar enough to survive dedup, so
        // the cap is the only thing shrinking the list.
        let content = |i: usize| format!("aspect{i} ").repeat(6).trim().to_string();
        assert!(strsim::normalized_levenshtein(&content(0), &content(1)) < 0.90);

        let reviews: Vec<_> = (0..30)
            .map(|i| make_review(&format!("s{i}"), &content(i), ReviewSource::Shopping))
            .collect();
        let registry = FetcherRegistry::new()
            .register(Arc::new(MockFetcher::new(ReviewSource::Shopping, reviews)));
        let orchestrator = AggregationOrchestrator::new(registry, 10);

        let merged = orchestrator
            .fetch_and_filter(TITLE, None, &all_sources(), &FetchBudget::default())
            .await;
        assert_eq!(merged.len(), 10);
    }

    #[tokio::test]
    async fn unregistered_sources_are_skipped() {
        let registry = FetcherRegistry::new().register(Arc::new(MockFetcher::new(
            ReviewSource::Forum,
            vec![make_review("f1", "only the forum fetcher exists here", ReviewSource::Forum)],
        )));
        let orchestrator = AggregationOrchestrator::new(registry, 60);

        let reviews = orchestrator
            .fetch_and_filter(TITLE, None, &all_sources(), &FetchBudget::default())
            .await;
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test]
    async fn normalize_step_wraps_merged_reviews() {
        let registry = FetcherRegistry::new().register(Arc::new(MockFetcher::new(
            ReviewSource::Shopping,
            vec![make_review("s1", "good bass, flight-friendly case", ReviewSource::Shopping)],
        )));
        let orchestrator = AggregationOrchestrator::new(registry, 60);

        let batch = orchestrator
            .fetch_filter_normalize(
                TITLE,
                None,
                &all_sources(),
                &FetchBudget::default(),
                &NoopNormalizer,
                NormalizationContext::Store,
            )
            .await
            .unwrap();

        assert_eq!(batch.reviews.len(), 1);
        assert_eq!(batch.filtered_count, 0);
    }

    #[test]
    fn stats_display_is_compact() {
        let stats = HarvestStats {
            per_source: vec![(ReviewSource::Shopping, 12), (ReviewSource::Forum, 3)],
            before_dedup: 15,
            after_dedup: 14,
            merged: 14,
            elapsed_secs: 2.34,
        };
        let line = stats.to_string();
        assert!(line.contains("shopping=12"));
        assert!(line.contains("deduped=14"));
    }
}
