use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use reviewradar_common::{CandidateReview, FetchBudget, ProductIdentity, ReviewSource};

use crate::gate::{ContentGate, GateConfig, GateDecision};
use crate::relevance::Scorer;
use crate::scraper::{extract_links_by_patterns, PageScraper, WebSearcher};
use crate::traits::ReviewFetcher;

/// Enthusiast forums worth searching. Site-scoped queries keep general web
/// noise out of the result set.
const FORUM_SITES: &[&str] = &["head-fi.org", "avforums.com", "forums.whathifi.com"];

/// URL path markers that identify a thread page rather than an index.
const THREAD_MARKERS: &[&str] = &["/thread/", "/discussion/", "/topic/", "/post/", "/posts/"];

const RESULTS_PER_QUERY: usize = 10;

/// Accepted pages are cut to this many bytes of extracted text.
const MAX_EXCERPT_BYTES: usize = 4000;

/// Discovers forum threads via site-scoped search, pulls each page through
/// Readability, and gates the whole extracted page at once.
pub struct ForumFetcher {
    searcher: Arc<dyn WebSearcher>,
    scraper: Arc<dyn PageScraper>,
    scorer: Arc<dyn Scorer>,
    page_gate: ContentGate,
}

impl ForumFetcher {
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        scraper: Arc<dyn PageScraper>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            searcher,
            scraper,
            scorer,
            page_gate: ContentGate::new(GateConfig::page()),
        }
    }

    async fn discover_urls(&self, identity: &ProductIdentity, budget: &FetchBudget) -> Vec<String> {
        let mut urls = Vec::new();
        let mut seen = HashSet::new();

        for site in FORUM_SITES.iter().take(budget.max_queries) {
            let query = format!("site:{site} {} review", identity.raw_title.trim());
            let mut found = 0usize;
            match self.searcher.search(&query, RESULTS_PER_QUERY).await {
                Ok(results) => {
                    for result in results {
                        let is_thread = THREAD_MARKERS.iter().any(|m| result.url.contains(m));
                        if is_thread && seen.insert(result.url.clone()) {
                            urls.push(result.url);
                            found += 1;
                        }
                    }
                }
                Err(e) => warn!(query, error = %e, "Forum search failed"),
            }

            // Web search came up empty for this site. Its own search page
            // still lists threads in plain anchors.
            if found == 0 {
                let search_url = site_search_url(site, identity.raw_title.trim());
                match self.scraper.scrape_raw(&search_url).await {
                    Ok(html) => {
                        let links = extract_links_by_patterns(
                            &html,
                            &search_url,
                            THREAD_MARKERS,
                            RESULTS_PER_QUERY,
                        );
                        debug!(site, count = links.len(), "Site search fallback");
                        for link in links {
                            if seen.insert(link.clone()) {
                                urls.push(link);
                            }
                        }
                    }
                    Err(e) => debug!(site, error = %e, "Site search page unavailable"),
                }
            }
        }

        urls.truncate(budget.max_pages);
        urls
    }
}

fn site_search_url(site: &str, title: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
    format!("https://{site}/search/?q={encoded}")
}

#[async_trait]
impl ReviewFetcher for ForumFetcher {
    async fn fetch(
        &self,
        identity: &ProductIdentity,
        budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        if identity.is_empty() {
            warn!("Empty product identity, skipping forum fetch");
            return Vec::new();
        }

        let started = Instant::now();
        let urls = self.discover_urls(identity, budget).await;
        let mut reviews = Vec::new();

        for url in urls {
            if budget.expired(started) {
                info!("Forum budget expired, returning partial results");
                break;
            }

            let text = match self.scraper.scrape(&url).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(url, error = %e, "Forum page scrape failed, skipping");
                    continue;
                }
            };

            match self.page_gate.evaluate(&text, identity, self.scorer.as_ref()) {
                GateDecision::Accept { relevance } => {
                    let excerpt = excerpt(&text);
                    let host = url::Url::parse(&url)
                        .ok()
                        .and_then(|u| u.host_str().map(str::to_string))
                        .unwrap_or_else(|| "forum".to_string());
                    reviews.push(CandidateReview {
                        external_id: format!("forum_{}", url_hash(&url)),
                        author: host,
                        rating: None,
                        title: identity.raw_title.clone(),
                        content: excerpt,
                        source: ReviewSource::Forum,
                        source_url: url,
                        relevance,
                        fetched_at: Utc::now(),
                    });
                }
                GateDecision::Reject(rule) => debug!(url, rule = %rule, "Forum page rejected"),
            }
        }

        info!(source = "forum", count = reviews.len(), "Forum fetch complete");
        reviews
    }

    fn source(&self) -> ReviewSource {
        ReviewSource::Forum
    }
}

fn excerpt(text: &str) -> String {
    let mut end = MAX_EXCERPT_BYTES.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
