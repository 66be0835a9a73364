use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};

use crate::core::config::OrchestratorConfig;
use crate::core::SourceError;
use crate::sources::{RawSignal, SourceAdapter, SourceBreaker, SourceRegistry};

/// Everything the sources reported for one symbol in one cycle. Built only
/// here and immutable once handed downstream: there is no way to add a
/// signal after the freeze.
#[derive(Debug, Clone)]
pub struct SourceSignalSet {
    symbol: String,
    cycle_ts: DateTime<Utc>,
    signals: HashMap<String, RawSignal>,
}

impl SourceSignalSet {
    pub fn from_signals(
        symbol: &str,
        cycle_ts: DateTime<Utc>,
        signals: Vec<RawSignal>,
    ) -> Self {
        let mut map = HashMap::new();
        for signal in signals {
            // At most one entry per source per cycle; first report wins.
            if map.contains_key(&signal.source_id) {
                tracing::warn!(
                    "Duplicate signal from '{}' for {} dropped",
                    signal.source_id,
                    symbol
                );
                continue;
            }
            map.insert(signal.source_id.clone(), signal);
        }
        Self {
            symbol: symbol.to_string(),
            cycle_ts,
            signals: map,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn cycle_ts(&self) -> DateTime<Utc> {
        self.cycle_ts
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, source_id: &str) -> Option<&RawSignal> {
        self.signals.get(source_id)
    }

    pub fn signals(&self) -> impl Iterator<Item = &RawSignal> {
        self.signals.values()
    }
}

/// Runs the per-symbol fan-out: substitutable primaries race to the first
/// success, independent sources are gathered side by side, and the whole
/// cycle is bounded by a hard deadline. Failures surface only as absence in
/// the frozen set.
pub struct Orchestrator {
    registry: Arc<SourceRegistry>,
    breaker: Arc<SourceBreaker>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        breaker: Arc<SourceBreaker>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            breaker,
            config,
        }
    }

    pub async fn gather(&self, symbol: &str) -> SourceSignalSet {
        let cycle_ts = Utc::now();
        let deadline = Instant::now() + Duration::from_millis(self.config.cycle_deadline_ms);

        let (primary, independents) = tokio::join!(
            self.race_primaries(symbol, deadline),
            self.gather_independents(symbol, deadline)
        );

        let mut collected = Vec::new();
        let frozen_at = Utc::now();
        for signal in primary.into_iter().chain(independents) {
            if signal.is_expired(frozen_at) {
                tracing::warn!(
                    "Stale signal from '{}' for {} discarded (generated {})",
                    signal.source_id,
                    symbol,
                    signal.generated_at
                );
                continue;
            }
            collected.push(signal);
        }

        let set = SourceSignalSet::from_signals(symbol, cycle_ts, collected);
        tracing::debug!(
            "Cycle for {} froze with {} source(s)",
            symbol,
            set.len()
        );
        set
    }

    /// All substitutable providers answer the same market fact, so the first
    /// success wins and the rest are cancelled by dropping their futures.
    async fn race_primaries(&self, symbol: &str, deadline: Instant) -> Option<RawSignal> {
        let adapters = self.active_sources(self.registry.primaries());
        if adapters.is_empty() {
            return None;
        }

        let race_deadline =
            deadline.min(Instant::now() + Duration::from_millis(self.config.race_timeout_ms));
        let source_timeout = Duration::from_millis(self.config.source_timeout_ms);

        let mut fetches = FuturesUnordered::new();
        for adapter in adapters {
            let symbol = symbol.to_string();
            fetches.push(async move {
                let id = adapter.source_id().to_string();
                let result = match timeout(source_timeout, adapter.fetch(&symbol)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(source_timeout)),
                };
                (id, result)
            });
        }

        let race = async {
            while let Some((id, result)) = fetches.next().await {
                match result {
                    Ok(signal) => return Some(signal),
                    Err(e) => self.exclude_source(&id, &e),
                }
            }
            None
        };

        match timeout_at(race_deadline, race).await {
            Ok(winner) => winner,
            Err(_) => {
                tracing::debug!("Primary race for {} hit its timeout", symbol);
                None
            }
        }
    }

    /// Independent sources each carry a distinct signal type: one failing or
    /// stalling excludes only itself, and the global deadline aborts whatever
    /// is still pending.
    async fn gather_independents(&self, symbol: &str, deadline: Instant) -> Vec<RawSignal> {
        let adapters = self.active_sources(self.registry.independents());
        if adapters.is_empty() {
            return Vec::new();
        }

        let source_timeout = Duration::from_millis(self.config.source_timeout_ms);
        let mut tasks = JoinSet::new();
        for adapter in adapters {
            let symbol = symbol.to_string();
            tasks.spawn(async move {
                let id = adapter.source_id().to_string();
                let result = match timeout(source_timeout, adapter.fetch(&symbol)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(source_timeout)),
                };
                (id, result)
            });
        }

        let mut collected = Vec::new();
        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(signal))) => collected.push(signal),
                    Ok((id, Err(e))) => self.exclude_source(&id, &e),
                    Err(e) => tracing::warn!("Independent fetch task failed: {}", e),
                }
            }
        };

        if timeout_at(deadline, drain).await.is_err() {
            let pending = tasks.len();
            tasks.abort_all();
            tracing::warn!(
                "Cycle deadline for {} reached, {} independent source(s) excluded",
                symbol,
                pending
            );
        }

        collected
    }

    fn active_sources(
        &self,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Vec<Arc<dyn SourceAdapter>> {
        adapters
            .into_iter()
            .filter(|a| {
                if self.breaker.is_disabled(a.source_id()) {
                    tracing::debug!("Skipping disabled source '{}'", a.source_id());
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    fn exclude_source(&self, source_id: &str, error: &SourceError) {
        if error.is_structural() {
            self.breaker.trip(source_id, &error.to_string());
        } else if matches!(error, SourceError::Malformed(_)) {
            tracing::warn!("Source '{}' excluded: {}", source_id, error);
        } else {
            tracing::debug!("Source '{}' excluded: {}", source_id, error);
        }
    }
}
