pub mod cache;
pub mod gate;

pub use cache::SignalCache;
pub use gate::{GateDecision, PolicyBranch, ThresholdGate};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::config::ConsensusConfig;
use crate::core::ConsensusError;
use crate::orchestrator::SourceSignalSet;
use crate::sources::{Direction, Regime};

/// The weighted aggregate of one cycle's signals. A pure derivation of the
/// frozen signal set: recomputing from the same set always yields the same
/// result.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusResult {
    pub symbol: String,
    pub direction: Direction,
    /// 0..=100
    pub confidence: f64,
    /// Winning share of the directional mass, 0..=1.
    pub agreement_score: f64,
    pub contributing_sources: BTreeSet<String>,
    pub regime: Regime,
    pub computed_at: DateTime<Utc>,
}

pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    /// Weighted vote over the frozen set.
    ///
    /// LONG/SHORT votes land fully on their side. A confident NEUTRAL is
    /// split across both sides with a mild long skew; a weak NEUTRAL is
    /// excluded entirely so it cannot dilute the consensus. A set whose only
    /// voter is a confident NEUTRAL reports that vote as-is: splitting a
    /// single voter would collapse its confidence artificially.
    pub fn compute(
        &self,
        set: &SourceSignalSet,
        regime: Regime,
    ) -> Result<ConsensusResult, ConsensusError> {
        if set.is_empty() {
            return Err(ConsensusError::InsufficientSources);
        }

        let contributing: Vec<_> = set
            .signals()
            .filter(|s| {
                s.direction != Direction::Neutral
                    || s.confidence >= self.config.neutral_split_threshold
            })
            .collect();

        if contributing.is_empty() {
            return Err(ConsensusError::InsufficientSources);
        }

        if let [only] = contributing.as_slice() {
            if only.direction == Direction::Neutral {
                return Ok(ConsensusResult {
                    symbol: set.symbol().to_string(),
                    direction: Direction::Neutral,
                    confidence: only.confidence.clamp(0.0, 100.0),
                    agreement_score: 1.0,
                    contributing_sources: [only.source_id.clone()].into(),
                    regime,
                    computed_at: Utc::now(),
                });
            }
        }

        let mut long_total = 0.0;
        let mut short_total = 0.0;
        let mut weight_sum = 0.0;
        let mut sources = BTreeSet::new();

        for signal in &contributing {
            let mass = signal.confidence * signal.weight;
            match signal.direction {
                Direction::Long => long_total += mass,
                Direction::Short => short_total += mass,
                Direction::Neutral => {
                    long_total += mass * self.config.neutral_split_skew;
                    short_total += mass * (1.0 - self.config.neutral_split_skew);
                }
            }
            weight_sum += signal.weight;
            sources.insert(signal.source_id.clone());
        }

        let (direction, winning_total) = if (long_total - short_total).abs()
            <= self.config.tie_epsilon
        {
            (Direction::Neutral, long_total.max(short_total))
        } else if long_total > short_total {
            (Direction::Long, long_total)
        } else {
            (Direction::Short, short_total)
        };

        let confidence = if weight_sum > 0.0 {
            (winning_total / weight_sum).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let directional_mass = long_total + short_total;
        let agreement_score = if directional_mass > 0.0 {
            (winning_total / directional_mass).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(ConsensusResult {
            symbol: set.symbol().to_string(),
            direction,
            confidence,
            agreement_score,
            contributing_sources: sources,
            regime,
            computed_at: Utc::now(),
        })
    }
}
