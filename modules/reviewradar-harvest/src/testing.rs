// Deterministic test doubles for the fetcher and loader seams.
//
// Everything here is HashMap-backed and built up with `with_*` methods:
// no network, no Chrome, no API keys.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use reviewradar_common::{CandidateReview, FetchBudget, ProductIdentity, ReviewSource};

use crate::relevance::Scorer;
use crate::scraper::{PageScraper, SearchResult, WebSearcher};
use crate::traits::{BrowserSession, DiscussionThread, ReviewFetcher, ThreadReply, ThreadSource};

// ---------------------------------------------------------------------------
// MockScorer — fixed score, counts invocations
// ---------------------------------------------------------------------------

pub struct MockScorer {
    score: f32,
    calls: AtomicUsize,
}

impl MockScorer {
    pub fn new(score: f32) -> Self {
        Self {
            score,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Scorer for MockScorer {
    fn score(&self, _text: &str, _identity: &ProductIdentity) -> f32 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.score
    }
}

// ---------------------------------------------------------------------------
// MockScraper — canned pages by URL
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockScraper {
    pages: HashMap<String, String>,
    raw_pages: HashMap<String, String>,
    scraped: Mutex<Vec<String>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    pub fn with_raw_page(mut self, url: &str, html: &str) -> Self {
        self.raw_pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn scraped_urls(&self) -> Vec<String> {
        self.scraped.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageScraper for MockScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        self.scraped.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(content) => Ok(content.clone()),
            None => anyhow::bail!("no canned page for {url}"),
        }
    }

    async fn scrape_raw(&self, url: &str) -> Result<String> {
        self.scraped.lock().unwrap().push(url.to_string());
        match self.raw_pages.get(url).or_else(|| self.pages.get(url)) {
            Some(content) => Ok(content.clone()),
            None => anyhow::bail!("no canned page for {url}"),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockSearcher — canned results by query
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockSearcher {
    results: HashMap<String, Vec<SearchResult>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, query: &str, url: &str, title: &str) -> Self {
        self.results
            .entry(query.to_string())
            .or_default()
            .push(SearchResult {
                url: url.to_string(),
                title: title.to_string(),
                snippet: String::new(),
            });
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        let mut results = self.results.get(query).cloned().unwrap_or_default();
        results.truncate(max_results);
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// MockThreadSource — canned threads and replies
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockThreadSource {
    threads: HashMap<String, Vec<DiscussionThread>>,
    replies: HashMap<String, Vec<ThreadReply>>,
    queries: Mutex<Vec<String>>,
}

impl MockThreadSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(mut self, query: &str, thread: DiscussionThread) -> Self {
        self.threads
            .entry(query.to_string())
            .or_default()
            .push(thread);
        self
    }

    pub fn with_replies(mut self, thread_id: &str, replies: Vec<ThreadReply>) -> Self {
        self.replies.insert(thread_id.to_string(), replies);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ThreadSource for MockThreadSource {
    async fn search_threads(&self, query: &str, limit: usize) -> Result<Vec<DiscussionThread>> {
        self.queries.lock().unwrap().push(query.to_string());
        let mut threads = self.threads.get(query).cloned().unwrap_or_default();
        threads.truncate(limit);
        Ok(threads)
    }

    async fn top_level_replies(
        &self,
        thread: &DiscussionThread,
        limit: usize,
    ) -> Result<Vec<ThreadReply>> {
        let mut replies = self.replies.get(&thread.id).cloned().unwrap_or_default();
        replies.truncate(limit);
        Ok(replies)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// FakeBrowserSession — scripted DOM
// ---------------------------------------------------------------------------

/// A browser whose item counts follow a per-selector script. When a script
/// runs out its last value repeats, which is how a page "stabilizes".
#[derive(Default)]
pub struct FakeBrowserSession {
    count_scripts: Mutex<HashMap<String, VecDeque<usize>>>,
    records: Vec<Vec<Option<String>>>,
    missing_controls: HashSet<String>,
    fail_navigation: bool,
    clicks: Mutex<Vec<(String, usize)>>,
    navigated: Mutex<Vec<String>>,
}

impl FakeBrowserSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counts(self, selector: &str, counts: Vec<usize>) -> Self {
        self.count_scripts
            .lock()
            .unwrap()
            .insert(selector.to_string(), counts.into());
        self
    }

    pub fn with_records(mut self, records: Vec<Vec<Option<String>>>) -> Self {
        self.records = records;
        self
    }

    /// Clicks on `selector` report that no such element exists.
    pub fn without_control(mut self, selector: &str) -> Self {
        self.missing_controls.insert(selector.to_string());
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn clicks(&self) -> Vec<(String, usize)> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn navigated(&self) -> Vec<String> {
        self.navigated.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserSession for FakeBrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        if self.fail_navigation {
            anyhow::bail!("navigation refused by fake browser");
        }
        self.navigated.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let mut scripts = self.count_scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(selector) else {
            return Ok(0);
        };
        if script.len() > 1 {
            Ok(script.pop_front().unwrap_or(0))
        } else {
            Ok(script.front().copied().unwrap_or(0))
        }
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<bool> {
        if self.missing_controls.contains(selector) {
            return Ok(false);
        }
        self.clicks
            .lock()
            .unwrap()
            .push((selector.to_string(), index));
        Ok(true)
    }

    async fn extract_records(
        &self,
        _container: &str,
        _fields: &[&str],
    ) -> Result<Vec<Vec<Option<String>>>> {
        Ok(self.records.clone())
    }
}

// ---------------------------------------------------------------------------
// MockFetcher — canned reviews, optional delay
// ---------------------------------------------------------------------------

pub struct MockFetcher {
    source: ReviewSource,
    reviews: Vec<CandidateReview>,
    delay: std::time::Duration,
}

impl MockFetcher {
    pub fn new(source: ReviewSource, reviews: Vec<CandidateReview>) -> Self {
        Self {
            source,
            reviews,
            delay: std::time::Duration::ZERO,
        }
    }

    /// Delay completion so merge-order tests can finish fetchers out of
    /// priority order.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ReviewFetcher for MockFetcher {
    async fn fetch(
        &self,
        _identity: &ProductIdentity,
        _budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reviews.clone()
    }

    fn source(&self) -> ReviewSource {
        self.source
    }
}

/// Quick candidate constructor for tests.
pub fn make_review(id: &str, content: &str, source: ReviewSource) -> CandidateReview {
    CandidateReview {
        external_id: id.to_string(),
        author: "tester".to_string(),
        rating: None,
        title: String::new(),
        content: content.to_string(),
        source,
        source_url: "https://example.com".to_string(),
        relevance: 0.8,
        fetched_at: chrono::Utc::now(),
    }
}
