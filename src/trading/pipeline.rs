use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use super::TradeSignal;
use crate::consensus::{ConsensusEngine, GateDecision, SignalCache, ThresholdGate};
use crate::core::{Config, ConsensusError};
use crate::distribution::{DistributionRecord, Distributor, Executor};
use crate::monitoring::AuditSink;
use crate::orchestrator::Orchestrator;
use crate::sources::{PriceFeed, Regime, SourceBreaker, SourceRegistry};

/// What one per-symbol cycle produced. Exactly one of these is returned and
/// logged for every cycle, so no cycle disappears silently.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing to act on: no sources reported, price unavailable, or a
    /// cycle for this symbol was already running.
    NoSignal(String),
    /// Computed but below the confidence bar.
    Rejected(GateDecision),
    /// Materially identical to the last emission for this symbol.
    Suppressed,
    /// Accepted and fanned out, with per-executor outcomes.
    Distributed {
        signal: TradeSignal,
        records: Vec<DistributionRecord>,
    },
}

/// Drives gather → consensus → gate → cache → distribute for each symbol on
/// an interval, one cycle in flight per symbol at a time.
pub struct SignalPipeline {
    orchestrator: Orchestrator,
    consensus: ConsensusEngine,
    gate: ThresholdGate,
    cache: SignalCache,
    distributor: Distributor,
    price_feed: Arc<dyn PriceFeed>,
    audit: Arc<dyn AuditSink>,
    in_flight: DashMap<String, ()>,
    symbols: Vec<String>,
    cycle_interval_secs: u64,
    default_regime: Regime,
}

impl SignalPipeline {
    pub fn new(
        config: &Config,
        registry: Arc<SourceRegistry>,
        breaker: Arc<SourceBreaker>,
        price_feed: Arc<dyn PriceFeed>,
        executors: Vec<Arc<dyn Executor>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(registry, breaker, config.orchestrator.clone()),
            consensus: ConsensusEngine::new(config.consensus.clone()),
            gate: ThresholdGate::new(config.gate.clone()),
            cache: SignalCache::new(config.cache.clone()),
            distributor: Distributor::new(executors, &config.distribution),
            price_feed,
            audit,
            in_flight: DashMap::new(),
            symbols: config.orchestrator.symbols.clone(),
            cycle_interval_secs: config.orchestrator.cycle_interval_secs,
            default_regime: config.orchestrator.default_regime,
        }
    }

    /// Spawns the interval loop. Each tick fans one cycle task out per
    /// symbol; the single-flight guard keeps a slow cycle from overlapping
    /// with the next tick for the same symbol.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            "Signal pipeline starting: {} symbol(s), every {}s",
            self.symbols.len(),
            self.cycle_interval_secs
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
                self.cycle_interval_secs,
            ));

            loop {
                interval.tick().await;

                for symbol in &self.symbols {
                    let pipeline = self.clone();
                    let symbol = symbol.clone();
                    tokio::spawn(async move {
                        pipeline.run_cycle(&symbol, pipeline.default_regime).await;
                    });
                }

                let purged = self.cache.purge_expired();
                if purged > 0 {
                    tracing::debug!("Purged {} expired cache entries", purged);
                }
            }
        })
    }

    pub async fn run_cycle(&self, symbol: &str, regime: Regime) -> CycleOutcome {
        match self.in_flight.entry(symbol.to_string()) {
            Entry::Occupied(_) => {
                tracing::debug!("Cycle for {} already in flight, skipping tick", symbol);
                return CycleOutcome::NoSignal("cycle already in flight".to_string());
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let outcome = self.cycle_inner(symbol, regime).await;
        self.in_flight.remove(symbol);
        self.log_outcome(symbol, &outcome);
        outcome
    }

    async fn cycle_inner(&self, symbol: &str, regime: Regime) -> CycleOutcome {
        let set = self.orchestrator.gather(symbol).await;

        let result = match self.consensus.compute(&set, regime) {
            Ok(result) => result,
            Err(ConsensusError::InsufficientSources) => {
                return CycleOutcome::NoSignal("no sources reported".to_string());
            }
        };

        tracing::info!(
            "Consensus for {}: {} at {:.2}% ({} source(s), agreement {:.2})",
            symbol,
            result.direction,
            result.confidence,
            result.contributing_sources.len(),
            result.agreement_score
        );

        let decision = self.gate.accept(&result);
        if !decision.accepted {
            self.audit_async(&result, &[]);
            return CycleOutcome::Rejected(decision);
        }

        let price = match self.price_feed.last_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!("No entry price for {}: {}", symbol, e);
                return CycleOutcome::NoSignal(format!("price unavailable: {}", e));
            }
        };

        if !self.cache.should_emit(symbol, &result, price) {
            return CycleOutcome::Suppressed;
        }

        let signal = TradeSignal::from_consensus(&result, price);
        self.cache.record_emission(symbol, &result, price);

        let records = self.distributor.distribute(&signal).await;
        self.audit_async(&result, &records);

        CycleOutcome::Distributed { signal, records }
    }

    fn audit_async(&self, result: &crate::consensus::ConsensusResult, records: &[DistributionRecord]) {
        let audit = self.audit.clone();
        let result = result.clone();
        let records = records.to_vec();
        tokio::spawn(async move {
            if let Err(e) = audit.record(&result, &records).await {
                tracing::warn!("Audit sink failed: {}", e);
            }
        });
    }

    fn log_outcome(&self, symbol: &str, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::NoSignal(reason) => {
                tracing::debug!("Cycle for {}: no signal ({})", symbol, reason)
            }
            CycleOutcome::Rejected(decision) => {
                tracing::info!("Cycle for {}: rejected, {}", symbol, decision.reason)
            }
            CycleOutcome::Suppressed => {
                tracing::debug!("Cycle for {}: suppressed as redundant", symbol)
            }
            CycleOutcome::Distributed { signal, records } => tracing::info!(
                "Cycle for {}: {} {} @ {:.2} delivered to {} executor(s)",
                symbol,
                signal.direction,
                signal.confidence,
                signal.entry_price,
                records.len()
            ),
        }
    }
}
