use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Per-source availability state. Transitions happen only through explicit
/// calls, never as a side effect of reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceState {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerEntry {
    pub state: SourceState,
    pub reason: Option<String>,
    pub tripped_at: Option<DateTime<Utc>>,
}

/// Circuit-breaker registry for signal sources. A source that fails with a
/// structural error (bad credentials) is disabled and skipped on every
/// following cycle until an operator resets it, so the orchestrator stops
/// burning its budget on calls that cannot succeed.
pub struct SourceBreaker {
    entries: DashMap<String, BreakerEntry>,
}

impl SourceBreaker {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn is_disabled(&self, source_id: &str) -> bool {
        self.entries
            .get(source_id)
            .map(|e| e.state == SourceState::Disabled)
            .unwrap_or(false)
    }

    pub fn trip(&self, source_id: &str, reason: &str) {
        tracing::warn!("Disabling source '{}': {}", source_id, reason);
        self.entries.insert(
            source_id.to_string(),
            BreakerEntry {
                state: SourceState::Disabled,
                reason: Some(reason.to_string()),
                tripped_at: Some(Utc::now()),
            },
        );
    }

    pub fn reset(&self, source_id: &str) {
        if self.entries.remove(source_id).is_some() {
            tracing::info!("Source '{}' re-enabled", source_id);
        }
    }

    pub fn disabled_sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().state == SourceState::Disabled)
            .map(|e| e.key().clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn snapshot(&self) -> Vec<(String, BreakerEntry)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

impl Default for SourceBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_start_active() {
        let breaker = SourceBreaker::new();
        assert!(!breaker.is_disabled("massive"));
        assert!(breaker.disabled_sources().is_empty());
    }

    #[test]
    fn trip_disables_until_explicit_reset() {
        let breaker = SourceBreaker::new();
        breaker.trip("massive", "401 unauthorized");
        assert!(breaker.is_disabled("massive"));
        assert_eq!(breaker.disabled_sources(), vec!["massive".to_string()]);

        // Reads never flip the state back.
        assert!(breaker.is_disabled("massive"));

        breaker.reset("massive");
        assert!(!breaker.is_disabled("massive"));
    }

    #[test]
    fn snapshot_carries_reason_and_trip_time() {
        let breaker = SourceBreaker::new();
        breaker.trip("sentiment", "api key revoked");
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.len(), 1);
        let (id, entry) = &snapshot[0];
        assert_eq!(id, "sentiment");
        assert_eq!(entry.reason.as_deref(), Some("api key revoked"));
        assert!(entry.tripped_at.is_some());
    }
}
