use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use reviewradar_common::{CandidateReview, FetchBudget, ProductIdentity, ReviewSource};

use crate::loader::{InteractiveLoader, Selectors};
use crate::relevance::Scorer;
use crate::traits::{BrowserSession, ReviewFetcher};

/// Hard cap on reviews taken from one shopping results page.
const MAX_SHOPPING_REVIEWS: usize = 100;

/// Review text shorter than this is a rating stub, not an opinion.
const MIN_REVIEW_LEN: usize = 20;

/// Drives the interactive loader against a Google Shopping reviews panel
/// and parses the loaded records into candidates.
pub struct ShoppingFetcher {
    url: String,
    chrome_bin: Option<String>,
    scorer: Arc<dyn Scorer>,
}

impl ShoppingFetcher {
    pub fn new(url: String, chrome_bin: Option<String>, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            url,
            chrome_bin,
            scorer,
        }
    }

    /// The whole fetch against an externally-owned browser session. Split
    /// out so tests can drive it with a fake DOM.
    pub async fn fetch_with_session(
        &self,
        session: &dyn BrowserSession,
        identity: &ProductIdentity,
        budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        let loader = InteractiveLoader::new(session, Selectors::google_shopping());
        let outcome = match loader.run(&self.url, budget).await {
            Ok(o) => o,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Shopping page load failed");
                return Vec::new();
            }
        };

        let mut reviews = Vec::new();
        for record in outcome.records {
            if reviews.len() >= MAX_SHOPPING_REVIEWS {
                break;
            }
            let Some(review) = self.parse_record(&record, identity) else {
                continue;
            };
            reviews.push(review);
        }

        info!(
            source = "shopping",
            loaded = outcome.final_count,
            kept = reviews.len(),
            rounds = outcome.rounds,
            "Shopping fetch complete"
        );
        reviews
    }

    /// Record layout follows Selectors::google_shopping field order:
    /// author, rating, text.
    fn parse_record(
        &self,
        record: &[Option<String>],
        identity: &ProductIdentity,
    ) -> Option<CandidateReview> {
        let text = record.get(2)?.as_deref()?.trim().to_string();
        if text.len() < MIN_REVIEW_LEN {
            return None;
        }

        let author = record
            .first()
            .and_then(|a| a.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or("anonymous")
            .to_string();
        let rating = record
            .get(1)
            .and_then(|r| r.as_deref())
            .and_then(parse_rating);

        Some(CandidateReview {
            external_id: format!("shopping_{}", text_hash(&text)),
            author,
            rating,
            title: identity.raw_title.clone(),
            content: text.clone(),
            source: ReviewSource::Shopping,
            source_url: self.url.clone(),
            relevance: self.scorer.score(&text, identity),
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl ReviewFetcher for ShoppingFetcher {
    async fn fetch(
        &self,
        identity: &ProductIdentity,
        budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        if identity.is_empty() {
            warn!("Empty product identity, skipping shopping fetch");
            return Vec::new();
        }
        if !is_shopping_url(&self.url) {
            warn!(url = %self.url, "Not a shopping results URL, skipping");
            return Vec::new();
        }

        let session = match browser_client::ChromeSession::launch(self.chrome_bin.as_deref()).await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Chrome launch failed, skipping shopping fetch");
                return Vec::new();
            }
        };

        let reviews = self.fetch_with_session(&session, identity, budget).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Chrome session close failed");
        }
        reviews
    }

    fn source(&self) -> ReviewSource {
        ReviewSource::Shopping
    }
}

/// Accepts only Google results URLs that carry a shopping marker in the
/// query string.
pub fn is_shopping_url(raw: &str) -> bool {
    let Ok(parsed) = url::Url::parse(raw) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    if !(host == "google.com" || host.ends_with(".google.com") || host.contains(".google.")) {
        return false;
    }

    let query = parsed.query().unwrap_or_default();
    query.contains("udm=28")
        || query.contains("tbm=shop")
        || query.contains("ibp=")
        || query.contains("prds=")
}

/// Pull the leading star value out of strings like "4.0" or
/// "Rated 4.5 out of 5".
fn parse_rating(raw: &str) -> Option<f32> {
    raw.split_whitespace()
        .find_map(|token| token.parse::<f32>().ok())
        .filter(|r| (0.0..=5.0).contains(r) && *r > 0.0)
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use crate::relevance::RelevanceScorer;
    use crate::testing::FakeBrowserSession;

    const SHOPPING_URL: &str = "https://www.google.com/search?q=wh-1000xm5&udm=28";

    fn headphones() -> ProductIdentity {
        identity::extract("Sony WH-1000XM5", None)
    }

    fn fetcher() -> ShoppingFetcher {
        ShoppingFetcher::new(
            SHOPPING_URL.to_string(),
            None,
            Arc::new(RelevanceScorer),
        )
    }

    fn record(author: &str, rating: &str, text: &str) -> Vec<Option<String>> {
        vec![
            Some(author.to_string()),
            Some(rating.to_string()),
            Some(text.to_string()),
        ]
    }

    #[tokio::test]
    async fn records_parse_into_candidates() {
        let browser = FakeBrowserSession::new()
            .with_counts(r#"div[data-attrid="user_review"]"#, vec![2, 2, 2])
            .with_records(vec![
                record("alice", "4.0", "the wh-1000xm5 noise cancellation is superb"),
                record("bob", "Rated 2.5 out of 5", "too tight on my head, returned them"),
            ]);

        let reviews = fetcher()
            .fetch_with_session(&browser, &headphones(), &FetchBudget::default())
            .await;

        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].author, "alice");
        assert_eq!(reviews[0].rating, Some(4.0));
        assert_eq!(reviews[1].rating, Some(2.5));
        assert_eq!(reviews[0].source, ReviewSource::Shopping);
    }

    #[tokio::test]
    async fn stub_records_are_dropped() {
        let browser = FakeBrowserSession::new()
            .with_counts(r#"div[data-attrid="user_review"]"#, vec![3, 3, 3])
            .with_records(vec![
                record("alice", "5.0", "ok"),
                vec![Some("bob".to_string()), Some("4.0".to_string()), None],
                record("carol", "", "battery life is outstanding on these"),
            ]);

        let reviews = fetcher()
            .fetch_with_session(&browser, &headphones(), &FetchBudget::default())
            .await;

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].author, "carol");
        assert_eq!(reviews[0].rating, None);
    }

    #[tokio::test]
    async fn review_count_is_capped() {
        let records: Vec<Vec<Option<String>>> = (0..150)
            .map(|i| record("user", "4.0", &format!("review number {i} with plenty of text")))
            .collect();
        let browser = FakeBrowserSession::new()
            .with_counts(r#"div[data-attrid="user_review"]"#, vec![150, 150, 150])
            .with_records(records);

        let reviews = fetcher()
            .fetch_with_session(&browser, &headphones(), &FetchBudget::default())
            .await;
        assert_eq!(reviews.len(), MAX_SHOPPING_REVIEWS);
    }

    #[tokio::test]
    async fn failed_navigation_yields_empty() {
        let browser = FakeBrowserSession::new().failing_navigation();
        let reviews = fetcher()
            .fetch_with_session(&browser, &headphones(), &FetchBudget::default())
            .await;
        assert!(reviews.is_empty());
    }

    #[test]
    fn shopping_url_validation() {
        assert!(is_shopping_url(SHOPPING_URL));
        assert!(is_shopping_url(
            "https://www.google.de/search?q=xm5&tbm=shop"
        ));
        assert!(!is_shopping_url("https://www.google.com/search?q=xm5"));
        assert!(!is_shopping_url("https://shopping.example.com/?udm=28"));
        assert!(!is_shopping_url("not a url"));
    }

    #[test]
    fn rating_parsing_handles_prose_and_garbage() {
        assert_eq!(parse_rating("4.0"), Some(4.0));
        assert_eq!(parse_rating("Rated 4.5 out of 5"), Some(4.5));
        assert_eq!(parse_rating("no stars here"), None);
        assert_eq!(parse_rating("9000"), None);
    }
}
