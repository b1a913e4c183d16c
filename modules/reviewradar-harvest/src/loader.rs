use std::time::Instant;

use anyhow::{Context, Result};
use futures::future::join_all;
use reviewradar_common::FetchBudget;
use tracing::{debug, info, warn};

use crate::traits::BrowserSession;

/// Consecutive rounds with an unchanged item count before the page counts
/// as fully loaded.
const STABLE_ROUNDS: u32 = 2;

/// CSS selectors driving one interactive results page.
#[derive(Debug, Clone)]
pub struct Selectors {
    /// One element per loaded item.
    pub item: String,
    /// Child selectors read per item in the final extraction pass.
    pub fields: Vec<String>,
    /// Inline expanders ("read more" toggles), clicked every round.
    pub expand: Vec<String>,
    /// The pagination trigger that loads another batch.
    pub load_more: String,
}

impl Selectors {
    /// Google Shopping review panel, fields ordered author, rating, text.
    pub fn google_shopping() -> Self {
        Self {
            item: r#"div[data-attrid="user_review"]"#.to_string(),
            fields: vec![
                ".cbsD0d".to_string(),
                ".yi40Hd".to_string(),
                ".v168Le".to_string(),
            ],
            expand: vec![r#"[aria-expanded="false"]"#.to_string()],
            load_more: r#"[aria-label="More reviews"]"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoaderState {
    Idle,
    PageLoaded,
    Expanding,
    CountCheck,
    Clicking,
    Stopped,
}

/// Why the loader stopped pulling more content. All of these yield whatever
/// was loaded so far; none is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Item count unchanged for STABLE_ROUNDS consecutive rounds.
    Stabilized,
    /// Round ceiling hit before the page stabilized.
    RoundCeiling,
    /// Fetch budget wall clock ran out.
    BudgetExpired,
    /// The page grew but has no load-more control left to click.
    NoControl,
}

/// Per-run mutable loader state.
#[derive(Debug, Default)]
struct ScrapeSession {
    round: u32,
    last_count: Option<usize>,
    stable_rounds: u32,
}

/// Everything the loader pulled out of the page, plus how the run ended.
#[derive(Debug)]
pub struct LoadOutcome {
    /// One entry per item element, one field per configured field selector.
    pub records: Vec<Vec<Option<String>>>,
    pub rounds: u32,
    pub final_count: usize,
    pub stop: StopReason,
}

/// Incrementally loads a script-driven results page by alternating
/// expansion clicks, item-count checks, and load-more clicks until the
/// count stabilizes or a ceiling is hit.
///
/// Only the initial navigation can fail the run. Every later browser error
/// is swallowed, so a flaky mid-run click still yields the items loaded up
/// to that point.
pub struct InteractiveLoader<'a> {
    browser: &'a dyn BrowserSession,
    selectors: Selectors,
}

impl<'a> InteractiveLoader<'a> {
    pub fn new(browser: &'a dyn BrowserSession, selectors: Selectors) -> Self {
        Self { browser, selectors }
    }

    pub async fn run(&self, url: &str, budget: &FetchBudget) -> Result<LoadOutcome> {
        let started = Instant::now();
        let mut state = LoaderState::Idle;
        let mut session = ScrapeSession::default();
        let mut stop = StopReason::RoundCeiling;

        loop {
            match state {
                LoaderState::Idle => {
                    self.browser
                        .navigate(url)
                        .await
                        .with_context(|| format!("Initial navigation to {url} failed"))?;
                    state = LoaderState::PageLoaded;
                }
                LoaderState::PageLoaded => {
                    info!(url, "Interactive page loaded");
                    state = LoaderState::Expanding;
                }
                LoaderState::Expanding => {
                    if budget.expired(started) {
                        stop = StopReason::BudgetExpired;
                        state = LoaderState::Stopped;
                        continue;
                    }
                    if session.round >= budget.max_rounds {
                        stop = StopReason::RoundCeiling;
                        state = LoaderState::Stopped;
                        continue;
                    }
                    session.round += 1;
                    self.expand_all().await;
                    state = LoaderState::CountCheck;
                }
                LoaderState::CountCheck => {
                    let count = match self.browser.count(&self.selectors.item).await {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(error = %e, "Item count failed, treating as zero");
                            0
                        }
                    };
                    debug!(
                        round = session.round,
                        count,
                        last = ?session.last_count,
                        "Count check"
                    );

                    state = match session.last_count {
                        Some(prev) if prev == count => {
                            session.stable_rounds += 1;
                            if session.stable_rounds >= STABLE_ROUNDS {
                                stop = StopReason::Stabilized;
                                LoaderState::Stopped
                            } else {
                                LoaderState::Expanding
                            }
                        }
                        _ => {
                            session.stable_rounds = 0;
                            LoaderState::Clicking
                        }
                    };
                    session.last_count = Some(count);
                }
                LoaderState::Clicking => {
                    state = match self.browser.click_nth(&self.selectors.load_more, 0).await {
                        Ok(true) => {
                            debug!(round = session.round, "Load-more clicked");
                            LoaderState::Expanding
                        }
                        Ok(false) => {
                            info!(round = session.round, "No load-more control, stopping");
                            stop = StopReason::NoControl;
                            LoaderState::Stopped
                        }
                        Err(e) => {
                            warn!(error = %e, "Load-more click failed");
                            LoaderState::Expanding
                        }
                    };
                }
                LoaderState::Stopped => break,
            }
        }

        let records = match self
            .browser
            .extract_records(
                &self.selectors.item,
                &self
                    .selectors
                    .fields
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>(),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Final extraction failed, returning no records");
                Vec::new()
            }
        };

        let outcome = LoadOutcome {
            final_count: session.last_count.unwrap_or(0),
            rounds: session.round,
            records,
            stop,
        };
        info!(
            url,
            rounds = outcome.rounds,
            items = outcome.final_count,
            stop = ?outcome.stop,
            "Interactive load finished"
        );
        Ok(outcome)
    }

    /// Click every currently-visible expander, concurrently. Failures are
    /// ignored; an unexpanded item just yields shorter text.
    async fn expand_all(&self) {
        for selector in &self.selectors.expand {
            let visible = self.browser.count(selector).await.unwrap_or(0);
            let clicks = (0..visible).map(|i| self.browser.click_nth(selector, i));
            for result in join_all(clicks).await {
                if let Err(e) = result {
                    debug!(selector, error = %e, "Expander click failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowserSession;
    use std::time::Duration;

    fn budget(max_rounds: u32) -> FetchBudget {
        FetchBudget {
            max_rounds,
            time_limit: Duration::from_secs(60),
            ..FetchBudget::default()
        }
    }

    fn selectors() -> Selectors {
        Selectors::google_shopping()
    }

    fn browser_with(counts: Vec<usize>) -> FakeBrowserSession {
        FakeBrowserSession::new().with_counts(&selectors().item, counts)
    }

    #[tokio::test]
    async fn stops_on_stabilized_count() {
        // Count never changes, so two stable rounds end the run.
        let browser = browser_with(vec![10, 10, 10]);
        let loader = InteractiveLoader::new(&browser, selectors());

        let outcome = loader
            .run("https://www.google.com/search?udm=28", &budget(10))
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Stabilized);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.final_count, 10);
    }

    #[tokio::test]
    async fn never_stabilizing_page_hits_round_ceiling() {
        let browser = browser_with(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let loader = InteractiveLoader::new(&browser, selectors());

        let outcome = loader
            .run("https://www.google.com/search?udm=28", &budget(5))
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::RoundCeiling);
        assert_eq!(outcome.rounds, 5);
    }

    #[tokio::test]
    async fn stabilizing_after_growth_keeps_loaded_items() {
        let browser = browser_with(vec![10, 20, 30, 30, 30]).with_records(vec![vec![
            Some("alice".to_string()),
            Some("4.0".to_string()),
            Some("solid".to_string()),
        ]]);
        let loader = InteractiveLoader::new(&browser, selectors());

        let outcome = loader
            .run("https://www.google.com/search?udm=28", &budget(10))
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Stabilized);
        assert_eq!(outcome.final_count, 30);
        assert_eq!(outcome.records.len(), 1);

        // Count changed on rounds 1-3, so load-more was clicked each time.
        let load_more = selectors().load_more;
        let load_more_clicks = browser
            .clicks()
            .iter()
            .filter(|(selector, _)| *selector == load_more)
            .count();
        assert_eq!(load_more_clicks, 3);
    }

    #[tokio::test]
    async fn missing_load_more_control_stops_early() {
        // The page keeps growing but exposes no load-more control, so the
        // loader stops after the first click attempt instead of burning
        // the remaining rounds.
        let browser =
            browser_with(vec![10, 20, 30, 40, 50]).without_control(&selectors().load_more);
        let loader = InteractiveLoader::new(&browser, selectors());

        let outcome = loader
            .run("https://www.google.com/search?udm=28", &budget(10))
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::NoControl);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.final_count, 10);
    }

    #[tokio::test]
    async fn failed_navigation_is_fatal() {
        let browser = FakeBrowserSession::new().failing_navigation();
        let loader = InteractiveLoader::new(&browser, selectors());

        let result = loader.run("https://unreachable.example", &budget(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn expired_budget_returns_partial_immediately() {
        let browser = browser_with(vec![10, 20, 30]);
        let loader = InteractiveLoader::new(&browser, selectors());
        let expired = FetchBudget {
            time_limit: Duration::ZERO,
            ..FetchBudget::default()
        };

        let outcome = loader
            .run("https://www.google.com/search?udm=28", &expired)
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::BudgetExpired);
        assert_eq!(outcome.rounds, 0);
    }
}
