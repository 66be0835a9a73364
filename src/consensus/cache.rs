use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::ConsensusResult;
use crate::core::config::CacheConfig;
use crate::sources::Direction;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub direction: Direction,
    pub last_price: f64,
    pub last_emitted_at: Instant,
}

/// Suppresses re-emission of a signal that says nothing materially new:
/// same direction, price within the configured band, inside the TTL window.
/// Keyed by symbol; entries leave only through TTL expiry or replacement on
/// the next emission. Rebuildable from nothing, so never persisted.
pub struct SignalCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
}

impl SignalCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn should_emit(&self, symbol: &str, result: &ConsensusResult, current_price: f64) -> bool {
        let entry = match self.entries.get(symbol) {
            Some(entry) => entry,
            None => return true,
        };

        if entry.last_emitted_at.elapsed() >= Duration::from_secs(self.config.ttl_secs) {
            return true;
        }

        if entry.direction != result.direction {
            return true;
        }

        let moved = if entry.last_price > 0.0 {
            ((current_price - entry.last_price) / entry.last_price).abs()
        } else {
            f64::INFINITY
        };
        if moved >= self.config.min_price_move_ratio {
            return true;
        }

        tracing::debug!(
            "Suppressing {} emission ({}, moved {:.4}%)",
            symbol,
            entry.fingerprint,
            moved * 100.0
        );
        false
    }

    pub fn record_emission(&self, symbol: &str, result: &ConsensusResult, price: f64) {
        self.entries.insert(
            symbol.to_string(),
            CacheEntry {
                fingerprint: self.fingerprint(result.direction, price),
                direction: result.direction,
                last_price: price,
                last_emitted_at: Instant::now(),
            },
        );
    }

    /// Sweep out entries whose TTL elapsed. Expiry is the only eviction path
    /// besides replacement on emission.
    pub fn purge_expired(&self) -> usize {
        let ttl = Duration::from_secs(self.config.ttl_secs);
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.last_emitted_at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direction plus relative price bucket; two emissions inside the same
    /// bucket carry the same identity.
    fn fingerprint(&self, direction: Direction, price: f64) -> String {
        let bucket = if price > 0.0 {
            (price.ln() / (1.0 + self.config.min_price_move_ratio).ln()).floor() as i64
        } else {
            0
        };
        format!("{}:{}", direction, bucket)
    }
}
