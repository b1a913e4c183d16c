use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use reviewradar_common::{CandidateReview, FetchBudget, ProductIdentity, ReviewSource};

use crate::gate::{ContentGate, GateConfig, GateDecision};
use crate::relevance::Scorer;
use crate::traits::{DiscussionThread, ReviewFetcher, ThreadReply, ThreadSource};

/// Threads with fewer replies than this are skipped: not enough discussion
/// to be worth descending into.
const MIN_THREAD_REPLIES: usize = 3;
/// Threads pulled per query.
const THREADS_PER_QUERY: usize = 5;
/// Top-level replies pulled per thread.
const REPLIES_PER_THREAD: usize = 20;

/// Authors whose replies carry no opinion signal.
const SKIPPED_AUTHORS: &[&str] = &["[deleted]", "[removed]", "automoderator"];

/// Pulls opinions out of discussion-platform threads. Thread titles pass a
/// cheap thread gate before any replies are fetched; individual replies
/// pass the full reply gate.
pub struct DiscussionFetcher {
    threads: Arc<dyn ThreadSource>,
    scorer: Arc<dyn Scorer>,
    thread_gate: ContentGate,
    reply_gate: ContentGate,
}

impl DiscussionFetcher {
    pub fn new(threads: Arc<dyn ThreadSource>, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            threads,
            scorer,
            thread_gate: ContentGate::new(GateConfig::thread()),
            reply_gate: ContentGate::new(GateConfig::reply()),
        }
    }

    async fn harvest_thread(
        &self,
        thread: &DiscussionThread,
        identity: &ProductIdentity,
        seen: &mut HashSet<String>,
        out: &mut Vec<CandidateReview>,
    ) {
        let replies = match self
            .threads
            .top_level_replies(thread, REPLIES_PER_THREAD)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(thread = %thread.id, error = %e, "Reply fetch failed, skipping thread");
                return;
            }
        };

        for reply in replies {
            if SKIPPED_AUTHORS.contains(&reply.author.to_lowercase().as_str()) {
                continue;
            }

            let external_id = format!("discussion_{}_{}", thread.id, reply.id);
            if !seen.insert(external_id.clone()) {
                continue;
            }

            match self
                .reply_gate
                .evaluate(&reply.body, identity, self.scorer.as_ref())
            {
                GateDecision::Accept { relevance } => out.push(CandidateReview {
                    external_id,
                    author: reply.author,
                    rating: None,
                    title: thread.title.clone(),
                    content: reply.body,
                    source: ReviewSource::Discussion,
                    source_url: thread.url.clone(),
                    relevance,
                    fetched_at: Utc::now(),
                }),
                GateDecision::Reject(rule) => {
                    debug!(reply = %external_id, rule = %rule, "Reply rejected")
                }
            }
        }
    }
}

#[async_trait]
impl ReviewFetcher for DiscussionFetcher {
    async fn fetch(
        &self,
        identity: &ProductIdentity,
        budget: &FetchBudget,
    ) -> Vec<CandidateReview> {
        if identity.is_empty() {
            warn!("Empty product identity, skipping discussion fetch");
            return Vec::new();
        }

        let started = Instant::now();
        let mut seen_threads = HashSet::new();
        let mut seen_replies = HashSet::new();
        let mut reviews = Vec::new();

        for query in intent_queries(identity).iter().take(budget.max_queries) {
            if budget.expired(started) {
                info!("Discussion budget expired, returning partial results");
                break;
            }

            let threads = match self.threads.search_threads(query, THREADS_PER_QUERY).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(query, error = %e, "Thread search failed, skipping query");
                    continue;
                }
            };

            for thread in threads {
                if !seen_threads.insert(thread.id.clone()) {
                    continue;
                }
                if thread.reply_count < MIN_THREAD_REPLIES {
                    debug!(thread = %thread.id, replies = thread.reply_count, "Thread too quiet");
                    continue;
                }

                let thread_text = format!("{} {}", thread.title, thread.body);
                match self
                    .thread_gate
                    .evaluate(&thread_text, identity, self.scorer.as_ref())
                {
                    GateDecision::Accept { .. } => {
                        self.harvest_thread(&thread, identity, &mut seen_replies, &mut reviews)
                            .await
                    }
                    GateDecision::Reject(rule) => {
                        debug!(thread = %thread.id, rule = %rule, "Thread rejected")
                    }
                }
            }
        }

        info!(
            source = "discussion",
            count = reviews.len(),
            "Discussion fetch complete"
        );
        reviews
    }

    fn source(&self) -> ReviewSource {
        ReviewSource::Discussion
    }
}

// --- Reddit ThreadSource ---

#[derive(serde::Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(serde::Deserialize)]
struct RedditListingData {
    #[serde(default)]
    children: Vec<RedditChild>,
}

#[derive(serde::Deserialize)]
struct RedditChild {
    #[serde(default)]
    kind: String,
    data: RedditItem,
}

#[derive(Default, serde::Deserialize)]
#[serde(default)]
struct RedditItem {
    id: String,
    title: Option<String>,
    permalink: Option<String>,
    num_comments: Option<usize>,
    selftext: Option<String>,
    author: Option<String>,
    body: Option<String>,
}

/// Reddit's public JSON endpoints. No auth, but a descriptive user agent
/// is required or requests get throttled hard.
pub struct RedditSource {
    client: reqwest::Client,
}

impl RedditSource {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("reviewradar/0.1 (review aggregation)")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ThreadSource for RedditSource {
    async fn search_threads(&self, query: &str, limit: usize) -> anyhow::Result<Vec<DiscussionThread>> {
        let listing: RedditListing = self
            .client
            .get("https://www.reddit.com/search.json")
            .query(&[
                ("q", query),
                ("limit", &limit.to_string()),
                ("sort", "relevance"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let threads = listing
            .data
            .children
            .into_iter()
            .filter(|c| c.kind == "t3")
            .filter_map(|c| {
                let permalink = c.data.permalink?;
                Some(DiscussionThread {
                    id: c.data.id,
                    title: c.data.title.unwrap_or_default(),
                    url: format!("https://www.reddit.com{permalink}"),
                    reply_count: c.data.num_comments.unwrap_or(0),
                    body: c.data.selftext.unwrap_or_default(),
                })
            })
            .collect();
        Ok(threads)
    }

    async fn top_level_replies(
        &self,
        thread: &DiscussionThread,
        limit: usize,
    ) -> anyhow::Result<Vec<ThreadReply>> {
        let endpoint = format!("{}.json", thread.url.trim_end_matches('/'));
        let listings: Vec<RedditListing> = self
            .client
            .get(&endpoint)
            .query(&[("limit", limit.to_string()), ("depth", "1".to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // First listing is the post itself, second holds the comment tree.
        let Some(comments) = listings.into_iter().nth(1) else {
            return Ok(Vec::new());
        };

        let replies = comments
            .data
            .children
            .into_iter()
            .filter(|c| c.kind == "t1")
            .filter_map(|c| {
                let body = c.data.body.filter(|b| !b.is_empty())?;
                Some(ThreadReply {
                    id: c.data.id,
                    author: c.data.author.unwrap_or_else(|| "[deleted]".to_string()),
                    body,
                })
            })
            .collect();
        Ok(replies)
    }

    fn name(&self) -> &str {
        "reddit"
    }
}

/// Queries biased toward opinion content rather than product pages.
pub fn intent_queries(identity: &ProductIdentity) -> Vec<String> {
    let mut queries = vec![format!("{} review", identity.raw_title.trim())];
    if let Some(phrase) = identity.model_phrase() {
        queries.push(format!("{phrase} review"));
        queries.push(format!("{phrase} worth it"));
    }
    if let Some(model) = &identity.model {
        queries.push(format!("{model} problems experience"));
    }
    queries.dedup();
    queries
}
