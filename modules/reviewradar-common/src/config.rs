use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider (review normalization)
    pub anthropic_api_key: String,

    // Web search (discussion/forum discovery)
    pub serper_api_key: String,

    // Scraping
    pub http_timeout_secs: u64,
    pub chrome_bin: Option<String>,

    // Aggregation
    pub max_merged_reviews: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            serper_api_key: required_env("SERPER_API_KEY"),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("HTTP_TIMEOUT_SECS must be a number"),
            chrome_bin: env::var("CHROME_BIN").ok(),
            max_merged_reviews: env::var("MAX_MERGED_REVIEWS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("MAX_MERGED_REVIEWS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
