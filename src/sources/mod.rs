pub mod breaker;
pub mod http;
pub mod types;

pub use breaker::{SourceBreaker, SourceState};
pub use http::{HttpPriceFeed, HttpSourceAdapter};
pub use types::{Direction, RawSignal, Regime, SourceKind};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::core::SourceError;

/// Uniform capability every signal provider implements, regardless of the
/// backing API. Adapters are registered in an explicit table at startup.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    async fn fetch(&self, symbol: &str) -> Result<RawSignal, SourceError>;
}

/// Current-price collaborator for the pipeline's entry price.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn last_price(&self, symbol: &str) -> Result<f64>;
}

/// Explicit startup table of adapters. Partitioned by kind so the
/// orchestrator can race substitutable providers and gather the rest.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        tracing::info!(
            "Registered source '{}' ({:?})",
            adapter.source_id(),
            adapter.kind()
        );
        self.sources.push(adapter);
    }

    pub fn primaries(&self) -> Vec<Arc<dyn SourceAdapter>> {
        self.sources
            .iter()
            .filter(|s| s.kind() == SourceKind::Primary)
            .cloned()
            .collect()
    }

    pub fn independents(&self) -> Vec<Arc<dyn SourceAdapter>> {
        self.sources
            .iter()
            .filter(|s| s.kind() == SourceKind::Independent)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
