// Trait abstractions for fetcher dependencies.
//
// ReviewFetcher — the common contract all four source fetchers implement.
// ThreadSource — discussion-platform access (thread search + replies).
// BrowserSession — the scripted-browser seam the interactive loader drives.
//
// These enable deterministic testing with the mocks in testing.rs:
// no network, no Chrome. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;

use reviewradar_common::{CandidateReview, FetchBudget, ProductIdentity, ReviewSource};

// ---------------------------------------------------------------------------
// ReviewFetcher — common fetcher contract
// ---------------------------------------------------------------------------

/// One review source. A fetcher absorbs its own network, parse, and timeout
/// failures: it logs them and returns whatever it collected, so one bad
/// source can never sink the whole aggregation.
#[async_trait]
pub trait ReviewFetcher: Send + Sync {
    async fn fetch(&self, identity: &ProductIdentity, budget: &FetchBudget)
        -> Vec<CandidateReview>;

    fn source(&self) -> ReviewSource;
}

// ---------------------------------------------------------------------------
// ThreadSource — discussion platform access
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DiscussionThread {
    pub id: String,
    pub title: String,
    pub url: String,
    pub reply_count: usize,
    /// Author-written thread body, when the platform carries one.
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ThreadReply {
    pub id: String,
    pub author: String,
    pub body: String,
}

/// Search a discussion platform for threads and pull top-level replies.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    async fn search_threads(&self, query: &str, limit: usize) -> Result<Vec<DiscussionThread>>;

    async fn top_level_replies(
        &self,
        thread: &DiscussionThread,
        limit: usize,
    ) -> Result<Vec<ThreadReply>>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// BrowserSession — scripted browser seam
// ---------------------------------------------------------------------------

/// The subset of browser operations the interactive loader needs. Production
/// uses a headless-Chrome session; tests use a fake DOM sequence.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Click the `index`-th match. False when no such element exists.
    async fn click_nth(&self, selector: &str, index: usize) -> Result<bool>;

    /// Per-container child-field text extraction, one entry per container
    /// element, `None` where a field selector matched nothing.
    async fn extract_records(
        &self,
        container: &str,
        fields: &[&str],
    ) -> Result<Vec<Vec<Option<String>>>>;
}

#[async_trait]
impl BrowserSession for browser_client::ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        Ok(browser_client::ChromeSession::navigate(self, url).await?)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(browser_client::ChromeSession::count(self, selector).await?)
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<bool> {
        Ok(browser_client::ChromeSession::click_nth(self, selector, index).await?)
    }

    async fn extract_records(
        &self,
        container: &str,
        fields: &[&str],
    ) -> Result<Vec<Vec<Option<String>>>> {
        Ok(browser_client::ChromeSession::extract_records(self, container, fields).await?)
    }
}
