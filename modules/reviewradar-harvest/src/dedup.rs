use sha2::{Digest, Sha256};
use strsim::normalized_levenshtein;
use tracing::debug;

use reviewradar_common::CandidateReview;

/// Collapses exact and near-duplicate reviews, first seen wins.
///
/// Exact duplicates are caught by a SHA-256 over normalized content, so the
/// same text with different casing, punctuation, or whitespace still
/// collapses. Near-duplicates are caught by pairwise similarity against
/// prior survivors at the candidate's source threshold. Survivors are never
/// edited, losers are dropped, and input order is preserved.
pub struct Deduplicator;

impl Deduplicator {
    pub fn dedup(reviews: Vec<CandidateReview>) -> Vec<CandidateReview> {
        let mut seen_hashes = std::collections::HashSet::new();
        let mut survivors: Vec<CandidateReview> = Vec::new();
        let mut survivor_norms: Vec<String> = Vec::new();

        for review in reviews {
            let normalized = normalize(&review.content);
            let hash = content_hash(&normalized);

            if !seen_hashes.insert(hash) {
                debug!(
                    external_id = %review.external_id,
                    source = %review.source,
                    "Dropping exact duplicate"
                );
                continue;
            }

            let threshold = review.source.near_dup_threshold();
            let near_dup = survivor_norms
                .iter()
                .any(|prior| normalized_levenshtein(prior, &normalized) >= threshold);
            if near_dup {
                debug!(
                    external_id = %review.external_id,
                    source = %review.source,
                    threshold,
                    "Dropping near-duplicate"
                );
                continue;
            }

            survivor_norms.push(normalized);
            survivors.push(review);
        }

        survivors
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize(content: &str) -> String {
    let lowered: String = content
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else {
                ' '
            }
        })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn content_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reviewradar_common::ReviewSource;

    fn review(id: &str, content: &str, source: ReviewSource) -> CandidateReview {
        CandidateReview {
            external_id: id.to_string(),
            author: "tester".to_string(),
            rating: None,
            title: String::new(),
            content: content.to_string(),
            source,
            source_url: "https://example.com".to_string(),
            relevance: 0.8,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn exact_duplicates_collapse_across_formatting() {
        let reviews = vec![
            review("a", "Great sound, battery lasts forever!", ReviewSource::Forum),
            review("b", "great   sound battery lasts FOREVER", ReviewSource::Forum),
        ];
        let survivors = Deduplicator::dedup(reviews);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].external_id, "a");
    }

    #[test]
    fn first_seen_survives_and_order_is_stable() {
        let reviews = vec![
            review("first", "completely unique text about bass response", ReviewSource::Forum),
            review("second", "another distinct take on the microphone", ReviewSource::Forum),
            review("third", "completely unique text about bass response", ReviewSource::Forum),
        ];
        let survivors = Deduplicator::dedup(reviews);
        let ids: Vec<&str> = survivors.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    /// A pair at exactly 0.92 similarity collapses under the 0.90 default
    /// threshold but survives under the tighter 0.95 shopping threshold.
    #[test]
    fn near_dup_threshold_is_source_dependent() {
        // 100 chars, 8 substitutions: normalized Levenshtein similarity 0.92.
        let base = "a".repeat(100);
        let variant = format!("{}{}", "a".repeat(92), "b".repeat(8));
        let similarity = normalized_levenshtein(&base, &variant);
        assert!(
            (0.90..0.95).contains(&similarity),
            "test pair drifted: {similarity}"
        );

        let forum = Deduplicator::dedup(vec![
            review("a", &base, ReviewSource::Forum),
            review("b", &variant, ReviewSource::Forum),
        ]);
        assert_eq!(forum.len(), 1, "0.92 pair should collapse at 0.90");

        let shopping = Deduplicator::dedup(vec![
            review("a", &base, ReviewSource::Shopping),
            review("b", &variant, ReviewSource::Shopping),
        ]);
        assert_eq!(shopping.len(), 2, "0.92 pair should survive at 0.95");
    }

    #[test]
    fn distinct_reviews_all_survive() {
        let reviews = vec![
            review("a", "the noise cancellation is the best i have used", ReviewSource::Forum),
            review("b", "case feels cheap but the headphones are great", ReviewSource::Retailer),
            review("c", "returned mine after a week, clamping force hurt", ReviewSource::Shopping),
        ];
        assert_eq!(Deduplicator::dedup(reviews).len(), 3);
    }
}
