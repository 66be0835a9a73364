use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consensus::ConsensusResult;
use crate::sources::Direction;

/// The accepted, priced signal delivered to executors. Serializes to the
/// executor wire payload as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub signal_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub generated_at: DateTime<Utc>,
}

impl TradeSignal {
    /// Prices a consensus result at the current market price. Risk levels
    /// follow a fixed 2% stop with a reward ratio that widens with
    /// confidence; executors remain free to re-derive their own levels.
    pub fn from_consensus(result: &ConsensusResult, entry_price: f64) -> Self {
        let risk_percent = 0.02;
        let reward_ratio = 2.0 + result.confidence / 100.0;

        let (stop_loss, take_profit) = match result.direction {
            Direction::Long => (
                entry_price * (1.0 - risk_percent),
                entry_price * (1.0 + risk_percent * reward_ratio),
            ),
            Direction::Short => (
                entry_price * (1.0 + risk_percent),
                entry_price * (1.0 - risk_percent * reward_ratio),
            ),
            Direction::Neutral => (entry_price, entry_price),
        };

        Self {
            signal_id: Uuid::new_v4(),
            symbol: result.symbol.clone(),
            direction: result.direction,
            confidence: result.confidence,
            entry_price,
            stop_loss,
            take_profit,
            generated_at: Utc::now(),
        }
    }
}
