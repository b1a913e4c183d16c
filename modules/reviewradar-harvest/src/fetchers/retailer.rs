use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use reviewradar_common::{CandidateReview, FetchBudget, ProductIdentity, ReviewSource};

use crate::relevance::Scorer;
use crate::scraper::PageScraper;
use crate::traits::ReviewFetcher;

/// Browser renders allowed per run. Each render is a full Chrome launch.
const MAX_JS_RENDERS: usize = 2;

/// Extracted text shorter than this is not a product page worth keeping.
const MIN_PAGE_LEN: usize = 100;

/// Static text this short usually means the page never rendered.
const RENDER_SUSPECT_LEN: usize = 200;

/// Markers of a page that refuses to work without a script engine.
const JS_WALL_MARKERS: &[&str] = &[
    "enable javascript",
    "javascript is disabled",
    "javascript is required",
    "accept all cookies",
    "cookie consent",
];

/// Pulls review text from caller-supplied retailer product pages. Tries a
/// static fetch first and upgrades to a headless-browser render only when
/// the static result looks like a script wall, capped per run.
pub struct RetailerFetcher {
    urls: Vec<String>,
    scraper: Arc<dyn PageScraper>,
    renderer: Option<Arc<dyn PageScraper>>,
    scorer: Arc<dyn Scorer>,
}

impl RetailerFetcher {
    pub fn new(
        urls: Vec<String>,
        scraper: Arc<dyn PageScraper>,
        renderer: Option<Arc<dyn PageScraper>>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            urls,
            scraper,
            renderer,
            scorer,
        }
    }
}

/// True when the static text looks like a consent or script wall rather
/// than product content.
fn needs_js_render(text: &str) -> bool {
    let lowered = text.to_lowercase();
    text.trim().len() < RENDER_SUSPECT_LEN || JS_WALL_MARKERS.iter().any(|m| lowered.contains(m))
}

#[async_trait]
impl ReviewFetcher for RetailerFetcher {
    async fn fetch(
        &self,
        identity: &ProductIdentity,
        budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        if identity.is_empty() {
            warn!("Empty product identity, skipping retailer fetch");
            return Vec::new();
        }

        let started = Instant::now();
        let mut renders_used = 0;
        let mut reviews = Vec::new();

        for url in self.urls.iter().take(budget.max_pages) {
            if budget.expired(started) {
                info!("Retailer budget expired, returning partial results");
                break;
            }

            let mut text = match self.scraper.scrape(url).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(url, error = %e, "Retailer page scrape failed, skipping");
                    continue;
                }
            };

            if needs_js_render(&text) {
                if renders_used >= MAX_JS_RENDERS {
                    debug!(url, "Render cap reached, keeping static text");
                } else if let Some(renderer) = &self.renderer {
                    renders_used += 1;
                    match renderer.scrape(url).await {
                        Ok(rendered) if !rendered.trim().is_empty() => text = rendered,
                        Ok(_) => debug!(url, "Browser render produced nothing"),
                        Err(e) => warn!(url, error = %e, "Browser render failed"),
                    }
                }
            }

            if text.trim().len() < MIN_PAGE_LEN {
                debug!(url, "Retailer page too thin, skipping");
                continue;
            }

            let relevance = self.scorer.score(&text, identity);
            let host = url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| "retailer".to_string());
            reviews.push(CandidateReview {
                external_id: format!("retailer_{}", url_hash(url)),
                author: host,
                rating: None,
                title: identity.raw_title.clone(),
                content: text,
                source: ReviewSource::Retailer,
                source_url: url.clone(),
                relevance,
                fetched_at: Utc::now(),
            });
        }

        info!(
            source = "retailer",
            count = reviews.len(),
            renders = renders_used,
            "Retailer fetch complete"
        );
        reviews
    }

    fn source(&self) -> ReviewSource {
        ReviewSource::Retailer
    }
}

fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use crate::relevance::RelevanceScorer;
    use crate::testing::MockScraper;

    fn headphones() -> ProductIdentity {
        identity::extract("Sony WH-1000XM5", None)
    }

    fn product_page() -> String {
        "Customer reviews for the Sony WH-1000XM5. I bought these for travel and the \
         noise cancellation is superb. Comfort holds up on long flights and the \
         battery easily lasts a week of commuting. Multipoint pairing works without \
         fuss and the app equalizer is genuinely useful for tuning the sound."
            .to_string()
    }

    const URL_A: &str = "https://retail.example.com/p/wh-1000xm5";
    const URL_B: &str = "https://retail.example.com/p/wh-1000xm5-b";
    const URL_C: &str = "https://retail.example.com/p/wh-1000xm5-c";

    #[tokio::test]
    async fn static_page_is_kept_without_rendering() {
        let scraper = MockScraper::new().with_page(URL_A, &product_page());
        let renderer = Arc::new(MockScraper::new());
        let fetcher = RetailerFetcher::new(
            vec![URL_A.to_string()],
            Arc::new(scraper),
            Some(renderer.clone()),
            Arc::new(RelevanceScorer),
        );

        let reviews = fetcher.fetch(&headphones(), &FetchBudget::default()).await;

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].source, ReviewSource::Retailer);
        assert_eq!(reviews[0].author, "retail.example.com");
        assert!(renderer.scraped_urls().is_empty(), "renderer should be idle");
    }

    #[tokio::test]
    async fn script_wall_upgrades_to_browser_render() {
        let wall = "Please enable JavaScript to view customer reviews on this page, \
                    then reload. Our storefront requires scripting for review content \
                    and ratings to appear at all.";
        let scraper = MockScraper::new().with_page(URL_A, wall);
        let renderer = Arc::new(MockScraper::new().with_page(URL_A, &product_page()));
        let fetcher = RetailerFetcher::new(
            vec![URL_A.to_string()],
            Arc::new(scraper),
            Some(renderer.clone()),
            Arc::new(RelevanceScorer),
        );

        let reviews = fetcher.fetch(&headphones(), &FetchBudget::default()).await;

        assert_eq!(renderer.scraped_urls(), vec![URL_A.to_string()]);
        assert_eq!(reviews.len(), 1);
        assert!(reviews[0].content.contains("noise cancellation"));
    }

    #[tokio::test]
    async fn renders_are_capped_per_run() {
        let wall = "enable javascript to continue";
        let scraper = MockScraper::new()
            .with_page(URL_A, wall)
            .with_page(URL_B, wall)
            .with_page(URL_C, wall);
        let renderer = Arc::new(
            MockScraper::new()
                .with_page(URL_A, &product_page())
                .with_page(URL_B, &product_page())
                .with_page(URL_C, &product_page()),
        );
        let fetcher = RetailerFetcher::new(
            vec![URL_A.to_string(), URL_B.to_string(), URL_C.to_string()],
            Arc::new(scraper),
            Some(renderer.clone()),
            Arc::new(RelevanceScorer),
        );

        let reviews = fetcher.fetch(&headphones(), &FetchBudget::default()).await;

        assert_eq!(renderer.scraped_urls().len(), MAX_JS_RENDERS);
        // The third URL keeps its too-thin static text and is dropped.
        assert_eq!(reviews.len(), 2);
    }

    #[tokio::test]
    async fn scrape_failures_are_absorbed() {
        let fetcher = RetailerFetcher::new(
            vec![URL_A.to_string()],
            Arc::new(MockScraper::new()),
            None,
            Arc::new(RelevanceScorer),
        );
        let reviews = fetcher.fetch(&headphones(), &FetchBudget::default()).await;
        assert!(reviews.is_empty());
    }

    #[test]
    fn js_wall_detection_catches_markers_and_thin_pages() {
        assert!(needs_js_render("Please enable JavaScript to continue"));
        assert!(needs_js_render("tiny"));
        assert!(!needs_js_render(&product_page()));
    }
}
