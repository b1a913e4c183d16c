use thiserror::Error;

/// Error taxonomy for the aggregation pipeline.
///
/// Network, parse, and browser failures are source-local: a fetcher catches
/// them, logs, and contributes zero candidates. None of them ever aborts
/// the aggregation as a whole. Gate rejections are a filtering outcome,
/// not an error, and never appear here.
#[derive(Error, Debug)]
pub enum ReviewRadarError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Browser session error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
