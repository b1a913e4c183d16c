pub mod aggregator;
pub mod dedup;
pub mod fetchers;
pub mod gate;
pub mod identity;
pub mod loader;
pub mod normalizer;
pub mod relevance;
pub mod scraper;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
