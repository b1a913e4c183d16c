use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use reviewradar_common::{Config, FetchBudget, ReviewRadarError, ReviewSource};
use reviewradar_harvest::aggregator::AggregationOrchestrator;
use reviewradar_harvest::fetchers::{
    discussion::RedditSource, DiscussionFetcher, FetcherRegistry, ForumFetcher, RetailerFetcher,
    ShoppingFetcher,
};
use reviewradar_harvest::normalizer::{ClaudeNormalizer, NormalizationContext};
use reviewradar_harvest::relevance::RelevanceScorer;
use reviewradar_harvest::scraper::{BrowserScraper, HttpScraper, SerperSearcher};

const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";

/// Aggregate scattered product reviews into one deduplicated list.
#[derive(Parser)]
#[command(name = "reviewradar-harvest")]
struct Args {
    /// Product title, e.g. "Sony WH-1000XM5".
    #[arg(long)]
    title: String,

    /// Brand hint when the title does not start with the brand.
    #[arg(long)]
    brand: Option<String>,

    /// Sources to fetch: discussion, forum, retailer, shopping.
    #[arg(long, value_delimiter = ',', default_value = "discussion,forum")]
    sources: Vec<String>,

    /// Retailer product page URL. Repeatable.
    #[arg(long = "retailer-url")]
    retailer_urls: Vec<String>,

    /// Google Shopping results URL.
    #[arg(long)]
    shopping_url: Option<String>,

    /// Validate the merged list with Claude before printing.
    #[arg(long)]
    normalize: bool,

    /// Normalization context: community or store.
    #[arg(long, default_value = "community")]
    context: String,

    /// Per-source wall-clock budget in seconds.
    #[arg(long, default_value_t = 60)]
    time_limit_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("reviewradar=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let mut sources: Vec<ReviewSource> = args
        .sources
        .iter()
        .map(|s| ReviewSource::from_str(s).map_err(ReviewRadarError::Validation))
        .collect::<std::result::Result<_, _>>()?;
    if !args.retailer_urls.is_empty() && !sources.contains(&ReviewSource::Retailer) {
        sources.push(ReviewSource::Retailer);
    }
    if args.shopping_url.is_some() && !sources.contains(&ReviewSource::Shopping) {
        sources.push(ReviewSource::Shopping);
    }

    let run_id = uuid::Uuid::new_v4();
    info!(%run_id, title = %args.title, ?sources, "ReviewRadar harvest starting");

    let scorer = Arc::new(RelevanceScorer);
    let mut registry = FetcherRegistry::new()
        .register(Arc::new(DiscussionFetcher::new(
            Arc::new(RedditSource::new(config.http_timeout_secs)?),
            scorer.clone(),
        )))
        .register(Arc::new(ForumFetcher::new(
            Arc::new(SerperSearcher::new(&config.serper_api_key)?),
            Arc::new(HttpScraper::new(config.http_timeout_secs)?),
            scorer.clone(),
        )));

    if !args.retailer_urls.is_empty() {
        registry = registry.register(Arc::new(RetailerFetcher::new(
            args.retailer_urls.clone(),
            Arc::new(HttpScraper::new(config.http_timeout_secs)?),
            Some(Arc::new(BrowserScraper::new(config.chrome_bin.clone()))),
            scorer.clone(),
        )));
    }
    if let Some(url) = &args.shopping_url {
        registry = registry.register(Arc::new(ShoppingFetcher::new(
            url.clone(),
            config.chrome_bin.clone(),
            scorer.clone(),
        )));
    }

    let orchestrator = AggregationOrchestrator::new(registry, config.max_merged_reviews);
    let budget = FetchBudget {
        time_limit: Duration::from_secs(args.time_limit_secs),
        ..FetchBudget::default()
    };

    if args.normalize {
        let context = match args.context.as_str() {
            "community" => NormalizationContext::Community,
            "store" => NormalizationContext::Store,
            other => {
                return Err(ReviewRadarError::Validation(format!(
                    "Unknown context: {other}. Supported: community, store"
                ))
                .into())
            }
        };
        let normalizer =
            ClaudeNormalizer::new(Claude::new(&config.anthropic_api_key, CLAUDE_MODEL));
        let batch = orchestrator
            .fetch_filter_normalize(
                &args.title,
                args.brand.as_deref(),
                &sources,
                &budget,
                &normalizer,
                context,
            )
            .await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&batch).context("Failed to serialize batch")?
        );
    } else {
        let reviews = orchestrator
            .fetch_and_filter(&args.title, args.brand.as_deref(), &sources, &budget)
            .await;
        println!(
            "{}",
            serde_json::to_string_pretty(&reviews).context("Failed to serialize reviews")?
        );
    }

    Ok(())
}
