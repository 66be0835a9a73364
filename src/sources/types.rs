use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Coarse market-condition label. Only ever used to adjust the gate's
/// minimum-confidence bar downward, never to override a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Trending,
    Ranging,
    Volatile,
}

impl FromStr for Regime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trending" => Ok(Regime::Trending),
            "ranging" => Ok(Regime::Ranging),
            "volatile" => Ok(Regime::Volatile),
            other => Err(format!("unknown regime '{}'", other)),
        }
    }
}

/// Substitutable sources race for one market fact; independent sources each
/// contribute a distinct signal type and are gathered side by side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Primary,
    Independent,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(SourceKind::Primary),
            "independent" => Ok(SourceKind::Independent),
            other => Err(format!("unknown source kind '{}'", other)),
        }
    }
}

/// One provider's directional opinion for one symbol in one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignal {
    pub source_id: String,
    pub symbol: String,
    pub direction: Direction,
    /// 0..=100
    pub confidence: f64,
    /// (0, 1], configured per source at startup.
    pub weight: f64,
    pub generated_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl RawSignal {
    /// A signal whose TTL elapsed before the cycle froze came from a stale
    /// provider cache and must not vote.
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.generated_at + Duration::seconds(self.ttl_secs as i64) < at
    }
}
