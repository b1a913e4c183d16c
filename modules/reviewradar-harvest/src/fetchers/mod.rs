// One fetcher per review source, all behind the ReviewFetcher contract.
// The orchestrator only ever sees the registry.

pub mod discussion;
pub mod forum;
pub mod retailer;
pub mod shopping;

pub use discussion::DiscussionFetcher;
pub use forum::ForumFetcher;
pub use retailer::RetailerFetcher;
pub use shopping::ShoppingFetcher;

use std::collections::HashMap;
use std::sync::Arc;

use reviewradar_common::ReviewSource;

use crate::traits::ReviewFetcher;

/// Source-keyed fetcher registry. One fetcher per source; inserting a
/// second fetcher for the same source replaces the first.
#[derive(Default)]
pub struct FetcherRegistry {
    fetchers: HashMap<ReviewSource, Arc<dyn ReviewFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, fetcher: Arc<dyn ReviewFetcher>) -> Self {
        self.fetchers.insert(fetcher.source(), fetcher);
        self
    }

    pub fn get(&self, source: ReviewSource) -> Option<Arc<dyn ReviewFetcher>> {
        self.fetchers.get(&source).cloned()
    }

    pub fn sources(&self) -> Vec<ReviewSource> {
        self.fetchers.keys().copied().collect()
    }
}
