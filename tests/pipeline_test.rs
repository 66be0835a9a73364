use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use signal_fusion_engine::consensus::PolicyBranch;
use signal_fusion_engine::core::config::{
    CacheConfig, Config, ConsensusConfig, DistributionConfig, GateConfig, MonitoringConfig,
    OrchestratorConfig,
};
use signal_fusion_engine::core::{DeliveryError, SourceError};
use signal_fusion_engine::distribution::{
    DeliveryOutcome, ExecutionResponse, Executor,
};
use signal_fusion_engine::monitoring::AuditSink;
use signal_fusion_engine::sources::{
    Direction, PriceFeed, RawSignal, Regime, SourceAdapter, SourceBreaker, SourceKind,
    SourceRegistry,
};
use signal_fusion_engine::trading::{CycleOutcome, SignalPipeline, TradeSignal};

struct StubSource {
    id: String,
    kind: SourceKind,
    direction: Direction,
    confidence: f64,
    weight: f64,
    delay: Duration,
}

impl StubSource {
    fn new(
        id: &str,
        kind: SourceKind,
        direction: Direction,
        confidence: f64,
        weight: f64,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            direction,
            confidence,
            weight,
            delay: Duration::from_millis(10),
        })
    }

    fn slow(
        id: &str,
        kind: SourceKind,
        direction: Direction,
        confidence: f64,
        weight: f64,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            direction,
            confidence,
            weight,
            delay,
        })
    }
}

#[async_trait]
impl SourceAdapter for StubSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, symbol: &str) -> Result<RawSignal, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(RawSignal {
            source_id: self.id.clone(),
            symbol: symbol.to_string(),
            direction: self.direction,
            confidence: self.confidence,
            weight: self.weight,
            generated_at: Utc::now(),
            ttl_secs: 300,
        })
    }
}

struct RecordingExecutor {
    id: String,
    min_confidence: f64,
    calls: AtomicU32,
}

impl RecordingExecutor {
    fn new(id: &str, min_confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            min_confidence,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    fn executor_id(&self) -> &str {
        &self.id
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    async fn execute(&self, signal: &TradeSignal) -> Result<ExecutionResponse, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutionResponse {
            success: true,
            order_id: Some(format!("{}-{}", self.id, signal.signal_id)),
            error: None,
        })
    }
}

struct StaticFeed(f64);

#[async_trait]
impl PriceFeed for StaticFeed {
    async fn last_price(&self, _symbol: &str) -> anyhow::Result<f64> {
        Ok(self.0)
    }
}

struct NullAudit;

#[async_trait]
impl AuditSink for NullAudit {
    async fn record(
        &self,
        _result: &signal_fusion_engine::consensus::ConsensusResult,
        _records: &[signal_fusion_engine::distribution::DistributionRecord],
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

fn config() -> Config {
    Config {
        orchestrator: OrchestratorConfig {
            symbols: vec!["BTC-USDT".to_string()],
            cycle_interval_secs: 30,
            source_timeout_ms: 5_000,
            race_timeout_ms: 6_000,
            cycle_deadline_ms: 10_000,
            default_regime: Regime::Ranging,
        },
        consensus: ConsensusConfig {
            neutral_split_threshold: 65.0,
            neutral_split_skew: 0.55,
            tie_epsilon: 0.01,
        },
        gate: GateConfig {
            single_source_min: 80.0,
            two_source_min: 75.0,
            two_source_contested_min: 70.0,
            multi_source_min: 75.0,
            absolute_floor: 70.0,
            contested_agreement_cutoff: 0.75,
            trending_adjustment: 5.0,
            ranging_adjustment: 0.0,
            volatile_adjustment: 0.0,
        },
        cache: CacheConfig {
            ttl_secs: 45,
            min_price_move_ratio: 0.001,
        },
        distribution: DistributionConfig {
            delivery_timeout_ms: 7_000,
            max_attempts: 3,
            base_backoff_ms: 100,
        },
        monitoring: MonitoringConfig {
            health_port: 3000,
            log_level: "info".to_string(),
        },
        price_feed_url: "http://localhost:9000".to_string(),
        sources: Vec::new(),
        executors: Vec::new(),
    }
}

fn pipeline(
    sources: Vec<Arc<dyn SourceAdapter>>,
    executors: Vec<Arc<dyn Executor>>,
    price: f64,
    cfg: Config,
) -> SignalPipeline {
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(source);
    }
    SignalPipeline::new(
        &cfg,
        Arc::new(registry),
        Arc::new(SourceBreaker::new()),
        Arc::new(StaticFeed(price)),
        executors,
        Arc::new(NullAudit),
    )
}

#[tokio::test]
async fn two_aligned_sources_are_accepted_and_distributed() {
    // massive LONG@85 (w=0.5) + yfinance LONG@70 (w=0.3)
    // → (42.5 + 21.0) / 0.8 = 79.375% LONG, over the 75% two-source bar
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        StubSource::new("massive", SourceKind::Independent, Direction::Long, 85.0, 0.5),
        StubSource::new("yfinance", SourceKind::Independent, Direction::Long, 70.0, 0.3),
    ];
    let executor = RecordingExecutor::new("standard", 75.0);
    let p = pipeline(sources, vec![executor.clone()], 50_000.0, config());

    let outcome = p.run_cycle("BTC-USDT", Regime::Ranging).await;

    match outcome {
        CycleOutcome::Distributed { signal, records } => {
            assert_eq!(signal.direction, Direction::Long);
            assert!((signal.confidence - 79.375).abs() < 1e-9);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].outcome, DeliveryOutcome::Executed);
            assert!(records[0].order_id.is_some());
        }
        other => panic!("expected distribution, got {:?}", other),
    }
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lone_confident_neutral_is_rejected_at_the_single_source_bar() {
    // massive NEUTRAL@70 alone → NEUTRAL at 70, below the 80% bar
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![StubSource::new(
        "massive",
        SourceKind::Independent,
        Direction::Neutral,
        70.0,
        0.5,
    )];
    let p = pipeline(sources, vec![], 50_000.0, config());

    let outcome = p.run_cycle("BTC-USDT", Regime::Ranging).await;

    match outcome {
        CycleOutcome::Rejected(decision) => {
            assert_eq!(decision.branch, PolicyBranch::SingleSource);
            assert_eq!(decision.min_required, 80.0);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn executor_overrides_filter_who_is_contacted() {
    // 80% signal: the 75% executor is called, the 82% one never is
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![StubSource::new(
        "massive",
        SourceKind::Independent,
        Direction::Long,
        80.0,
        0.5,
    )];
    let standard = RecordingExecutor::new("standard", 75.0);
    let conservative = RecordingExecutor::new("conservative", 82.0);
    let p = pipeline(
        sources,
        vec![standard.clone(), conservative.clone()],
        50_000.0,
        config(),
    );

    let outcome = p.run_cycle("BTC-USDT", Regime::Ranging).await;

    match outcome {
        CycleOutcome::Distributed { records, .. } => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].executor_id, "standard");
        }
        other => panic!("expected distribution, got {:?}", other),
    }
    assert_eq!(standard.calls.load(Ordering::SeqCst), 1);
    assert_eq!(conservative.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn a_source_past_the_deadline_is_excluded_from_the_frozen_set() {
    // 10s deadline, one source answering at 12s → consensus from the rest
    let mut cfg = config();
    cfg.orchestrator.source_timeout_ms = 15_000;
    cfg.orchestrator.cycle_deadline_ms = 10_000;

    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        StubSource::new("massive", SourceKind::Independent, Direction::Long, 90.0, 0.5),
        StubSource::slow(
            "sentiment",
            SourceKind::Independent,
            Direction::Short,
            95.0,
            0.4,
            Duration::from_secs(12),
        ),
    ];
    let executor = RecordingExecutor::new("standard", 75.0);
    let p = pipeline(sources, vec![executor], 50_000.0, cfg);

    let started = tokio::time::Instant::now();
    let outcome = p.run_cycle("BTC-USDT", Regime::Ranging).await;

    assert!(started.elapsed() <= Duration::from_millis(10_100));
    match outcome {
        CycleOutcome::Distributed { signal, .. } => {
            // Only the prompt LONG source made the freeze
            assert_eq!(signal.direction, Direction::Long);
            assert!((signal.confidence - 90.0).abs() < 1e-9);
        }
        other => panic!("expected distribution from the remaining source, got {:?}", other),
    }
}

#[tokio::test]
async fn repeated_cycle_with_nothing_new_is_suppressed() {
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![StubSource::new(
        "massive",
        SourceKind::Independent,
        Direction::Long,
        90.0,
        0.5,
    )];
    let executor = RecordingExecutor::new("standard", 75.0);
    let p = pipeline(sources, vec![executor.clone()], 50_000.0, config());

    let first = p.run_cycle("BTC-USDT", Regime::Ranging).await;
    assert!(matches!(first, CycleOutcome::Distributed { .. }));

    let second = p.run_cycle("BTC-USDT", Regime::Ranging).await;
    assert!(matches!(second, CycleOutcome::Suppressed));

    // The executor only ever saw the first emission.
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn primaries_race_while_independents_gather() {
    // Two substitutable primaries: only the winner contributes alongside
    // the independent source.
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        StubSource::new("massive", SourceKind::Primary, Direction::Long, 85.0, 0.5),
        StubSource::slow(
            "yfinance",
            SourceKind::Primary,
            Direction::Long,
            70.0,
            0.3,
            Duration::from_secs(2),
        ),
        StubSource::new("technical", SourceKind::Independent, Direction::Long, 80.0, 0.4),
    ];
    let executor = RecordingExecutor::new("standard", 75.0);
    let p = pipeline(sources, vec![executor], 50_000.0, config());

    let outcome = p.run_cycle("BTC-USDT", Regime::Ranging).await;

    match outcome {
        CycleOutcome::Distributed { signal, .. } => {
            // massive (42.5) + technical (32.0) over weight 0.9
            let expected = (85.0 * 0.5 + 80.0 * 0.4) / 0.9;
            assert!((signal.confidence - expected).abs() < 1e-9);
        }
        other => panic!("expected distribution, got {:?}", other),
    }
}
