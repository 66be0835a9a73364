use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;

use crate::sources::{Regime, SourceKind};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub consensus: ConsensusConfig,
    pub gate: GateConfig,
    pub cache: CacheConfig,
    pub distribution: DistributionConfig,
    pub monitoring: MonitoringConfig,
    pub price_feed_url: String,
    pub sources: Vec<SourceSpec>,
    pub executors: Vec<ExecutorSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub symbols: Vec<String>,
    pub cycle_interval_secs: u64,
    /// Per-source fetch timeout (T2).
    pub source_timeout_ms: u64,
    /// Race-group timeout for substitutable sources (T1).
    pub race_timeout_ms: u64,
    /// Overall per-symbol cycle deadline (T3).
    pub cycle_deadline_ms: u64,
    pub default_regime: Regime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    /// NEUTRAL signals below this confidence are excluded entirely.
    pub neutral_split_threshold: f64,
    /// Long-side share of a split NEUTRAL contribution.
    pub neutral_split_skew: f64,
    /// Weighted totals closer than this resolve to NEUTRAL.
    pub tie_epsilon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    pub single_source_min: f64,
    pub two_source_min: f64,
    pub two_source_contested_min: f64,
    pub multi_source_min: f64,
    /// No regime adjustment may push the bar below this.
    pub absolute_floor: f64,
    /// Two-source splits with agreement below this count as contested.
    pub contested_agreement_cutoff: f64,
    pub trending_adjustment: f64,
    pub ranging_adjustment: f64,
    pub volatile_adjustment: f64,
}

impl GateConfig {
    /// Points subtracted from the 3+ source bar for the given regime.
    pub fn regime_adjustment(&self, regime: Regime) -> f64 {
        match regime {
            Regime::Trending => self.trending_adjustment,
            Regime::Ranging => self.ranging_adjustment,
            Regime::Volatile => self.volatile_adjustment,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Relative price move below which an unchanged-direction signal is
    /// considered redundant (0.001 = 0.1%).
    pub min_price_move_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    pub delivery_timeout_ms: u64,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub health_port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    pub kind: SourceKind,
    pub weight: f64,
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSpec {
    pub id: String,
    pub url: String,
    pub min_confidence: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let config = Config {
            orchestrator: OrchestratorConfig {
                symbols: env_str("SYMBOLS", "BTC-USDT,ETH-USDT")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                cycle_interval_secs: env_u64("CYCLE_INTERVAL_SECS", 30),
                source_timeout_ms: env_u64("SOURCE_TIMEOUT_MS", 5_000),
                race_timeout_ms: env_u64("RACE_TIMEOUT_MS", 6_000),
                cycle_deadline_ms: env_u64("CYCLE_DEADLINE_MS", 12_000),
                default_regime: env_str("DEFAULT_REGIME", "ranging")
                    .parse()
                    .unwrap_or(Regime::Ranging),
            },
            consensus: ConsensusConfig {
                neutral_split_threshold: env_f64("NEUTRAL_SPLIT_THRESHOLD", 65.0),
                neutral_split_skew: env_f64("NEUTRAL_SPLIT_SKEW", 0.55),
                tie_epsilon: env_f64("TIE_EPSILON", 0.01),
            },
            gate: GateConfig {
                single_source_min: env_f64("GATE_SINGLE_SOURCE_MIN", 80.0),
                two_source_min: env_f64("GATE_TWO_SOURCE_MIN", 75.0),
                two_source_contested_min: env_f64("GATE_TWO_SOURCE_CONTESTED_MIN", 70.0),
                multi_source_min: env_f64("GATE_MULTI_SOURCE_MIN", 75.0),
                absolute_floor: env_f64("GATE_ABSOLUTE_FLOOR", 70.0),
                contested_agreement_cutoff: env_f64("GATE_CONTESTED_AGREEMENT_CUTOFF", 0.75),
                trending_adjustment: env_f64("GATE_TRENDING_ADJUSTMENT", 5.0),
                ranging_adjustment: env_f64("GATE_RANGING_ADJUSTMENT", 0.0),
                volatile_adjustment: env_f64("GATE_VOLATILE_ADJUSTMENT", 0.0),
            },
            cache: CacheConfig {
                ttl_secs: env_u64("CACHE_TTL_SECS", 45),
                min_price_move_ratio: env_f64("CACHE_MIN_PRICE_MOVE_RATIO", 0.001),
            },
            distribution: DistributionConfig {
                delivery_timeout_ms: env_u64("DELIVERY_TIMEOUT_MS", 7_000),
                max_attempts: env_u64("DELIVERY_MAX_ATTEMPTS", 3) as u32,
                base_backoff_ms: env_u64("DELIVERY_BASE_BACKOFF_MS", 500),
            },
            monitoring: MonitoringConfig {
                health_port: env_u64("HEALTH_PORT", 3000) as u16,
                log_level: env_str("LOG_LEVEL", "info"),
            },
            price_feed_url: env_str("PRICE_FEED_URL", "http://localhost:9000"),
            sources: parse_sources(&env_str(
                "SIGNAL_SOURCES",
                "massive|primary|0.5|http://localhost:9001;\
                 yfinance|primary|0.3|http://localhost:9002;\
                 sentiment|independent|0.4|http://localhost:9003",
            ))?,
            executors: parse_executors(&env_str(
                "EXECUTORS",
                "standard|http://localhost:9101|75.0;\
                 conservative|http://localhost:9102|82.0",
            ))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Startup sanity checks. A misconfigured policy table would silently
    /// break the gate's monotonicity invariant, so it is rejected here.
    pub fn validate(&self) -> Result<()> {
        let g = &self.gate;
        if g.single_source_min < g.two_source_min || g.two_source_min < g.multi_source_min {
            bail!(
                "gate thresholds must be non-increasing in source count: {} / {} / {}",
                g.single_source_min,
                g.two_source_min,
                g.multi_source_min
            );
        }
        if g.two_source_contested_min > g.two_source_min {
            bail!("contested two-source bar cannot exceed the uncontested bar");
        }
        if g.absolute_floor > g.multi_source_min {
            bail!("absolute floor cannot exceed the multi-source bar");
        }
        if g.trending_adjustment < 0.0 || g.ranging_adjustment < 0.0 || g.volatile_adjustment < 0.0
        {
            bail!("regime adjustments only lower the bar, they must be >= 0");
        }

        let c = &self.consensus;
        if !(0.0..1.0).contains(&c.neutral_split_skew) || c.neutral_split_skew <= 0.0 {
            bail!("neutral split skew must lie in (0, 1)");
        }

        let o = &self.orchestrator;
        if o.source_timeout_ms > o.cycle_deadline_ms || o.race_timeout_ms > o.cycle_deadline_ms {
            bail!("per-source and race timeouts cannot exceed the cycle deadline");
        }
        if o.symbols.is_empty() {
            bail!("at least one symbol must be configured");
        }

        for spec in &self.sources {
            if spec.weight <= 0.0 || spec.weight > 1.0 {
                bail!("source {} weight {} outside (0, 1]", spec.id, spec.weight);
            }
        }
        let mut ids: Vec<&str> = self.sources.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.sources.len() {
            bail!("duplicate source ids in SIGNAL_SOURCES");
        }

        let mut ex_ids: Vec<&str> = self.executors.iter().map(|e| e.id.as_str()).collect();
        ex_ids.sort_unstable();
        ex_ids.dedup();
        if ex_ids.len() != self.executors.len() {
            bail!("duplicate executor ids in EXECUTORS");
        }

        Ok(())
    }
}

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// `id|kind|weight|url` entries separated by `;`. An optional per-source
/// API key is read from `SOURCE_<ID>_API_KEY`.
fn parse_sources(raw: &str) -> Result<Vec<SourceSpec>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
            if parts.len() != 4 {
                bail!("malformed source spec '{}', expected id|kind|weight|url", entry);
            }
            let id = parts[0].to_string();
            let kind: SourceKind = parts[1]
                .parse()
                .map_err(|e: String| anyhow::anyhow!("source {}: {}", id, e))?;
            let weight: f64 = parts[2]
                .parse()
                .with_context(|| format!("source {}: bad weight '{}'", id, parts[2]))?;
            let api_key = env::var(format!("SOURCE_{}_API_KEY", id.to_uppercase())).ok();
            Ok(SourceSpec {
                id,
                kind,
                weight,
                url: parts[3].to_string(),
                api_key,
            })
        })
        .collect()
}

/// `id|url|min_confidence` entries separated by `;`.
fn parse_executors(raw: &str) -> Result<Vec<ExecutorSpec>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
            if parts.len() != 3 {
                bail!(
                    "malformed executor spec '{}', expected id|url|min_confidence",
                    entry
                );
            }
            let min_confidence: f64 = parts[2]
                .parse()
                .with_context(|| format!("executor {}: bad threshold '{}'", parts[0], parts[2]))?;
            Ok(ExecutorSpec {
                id: parts[0].to_string(),
                url: parts[1].to_string(),
                min_confidence,
            })
        })
        .collect()
}
