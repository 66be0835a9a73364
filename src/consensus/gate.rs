use serde::Serialize;

use super::ConsensusResult;
use crate::core::config::GateConfig;

/// Which row of the policy table produced a decision. Recorded on every
/// decision so rejections can be audited and the table tested branch by
/// branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PolicyBranch {
    SingleSource,
    TwoSource,
    TwoSourceContested,
    MultiSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    pub accepted: bool,
    pub branch: PolicyBranch,
    pub min_required: f64,
    pub reason: String,
}

/// Adaptive minimum-confidence policy. Fewer voters demand a higher bar;
/// the regime can lower the multi-source bar but never push it below the
/// absolute floor.
pub struct ThresholdGate {
    config: GateConfig,
}

impl ThresholdGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn accept(&self, result: &ConsensusResult) -> GateDecision {
        let (branch, min_required) = match result.contributing_sources.len() {
            0 | 1 => (PolicyBranch::SingleSource, self.config.single_source_min),
            2 => {
                if result.agreement_score < self.config.contested_agreement_cutoff {
                    (
                        PolicyBranch::TwoSourceContested,
                        self.config.two_source_contested_min,
                    )
                } else {
                    (PolicyBranch::TwoSource, self.config.two_source_min)
                }
            }
            _ => {
                let adjusted = self.config.multi_source_min
                    - self.config.regime_adjustment(result.regime);
                (
                    PolicyBranch::MultiSource,
                    adjusted.max(self.config.absolute_floor),
                )
            }
        };

        let accepted = result.confidence >= min_required;
        let reason = if accepted {
            format!(
                "{:.2}% meets the {:.0}% bar ({:?})",
                result.confidence, min_required, branch
            )
        } else {
            format!(
                "{:.2}% below the {:.0}% bar ({:?})",
                result.confidence, min_required, branch
            )
        };

        GateDecision {
            accepted,
            branch,
            min_required,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{Direction, Regime};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn gate() -> ThresholdGate {
        ThresholdGate::new(GateConfig {
            single_source_min: 80.0,
            two_source_min: 75.0,
            two_source_contested_min: 70.0,
            multi_source_min: 75.0,
            absolute_floor: 70.0,
            contested_agreement_cutoff: 0.75,
            trending_adjustment: 10.0,
            ranging_adjustment: 0.0,
            volatile_adjustment: 0.0,
        })
    }

    fn result(sources: &[&str], confidence: f64, agreement: f64, regime: Regime) -> ConsensusResult {
        ConsensusResult {
            symbol: "BTC-USDT".to_string(),
            direction: Direction::Long,
            confidence,
            agreement_score: agreement,
            contributing_sources: sources.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            regime,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn single_source_needs_the_highest_bar() {
        let decision = gate().accept(&result(&["massive"], 79.0, 1.0, Regime::Ranging));
        assert!(!decision.accepted);
        assert_eq!(decision.branch, PolicyBranch::SingleSource);
        assert_eq!(decision.min_required, 80.0);

        let decision = gate().accept(&result(&["massive"], 81.0, 1.0, Regime::Ranging));
        assert!(decision.accepted);
    }

    #[test]
    fn two_aligned_sources_use_the_standard_bar() {
        let decision = gate().accept(&result(&["a", "b"], 76.0, 0.95, Regime::Ranging));
        assert!(decision.accepted);
        assert_eq!(decision.branch, PolicyBranch::TwoSource);
    }

    #[test]
    fn contested_two_source_split_lowers_the_bar() {
        let decision = gate().accept(&result(&["a", "b"], 72.0, 0.6, Regime::Ranging));
        assert!(decision.accepted);
        assert_eq!(decision.branch, PolicyBranch::TwoSourceContested);
        assert_eq!(decision.min_required, 70.0);
    }

    #[test]
    fn regime_lowers_the_multi_source_bar_only_to_the_floor() {
        // trending adjustment of 10 would reach 65, the floor holds at 70
        let decision = gate().accept(&result(&["a", "b", "c"], 71.0, 0.9, Regime::Trending));
        assert!(decision.accepted);
        assert_eq!(decision.branch, PolicyBranch::MultiSource);
        assert_eq!(decision.min_required, 70.0);

        let decision = gate().accept(&result(&["a", "b", "c"], 71.0, 0.9, Regime::Ranging));
        assert!(!decision.accepted);
        assert_eq!(decision.min_required, 75.0);
    }

    #[test]
    fn bars_are_monotone_in_source_count() {
        let g = gate();
        for regime in [Regime::Trending, Regime::Ranging, Regime::Volatile] {
            let one = g.accept(&result(&["a"], 50.0, 1.0, regime)).min_required;
            let two = g.accept(&result(&["a", "b"], 50.0, 0.9, regime)).min_required;
            let three = g
                .accept(&result(&["a", "b", "c"], 50.0, 0.9, regime))
                .min_required;
            assert!(one >= two, "{:?}: {} < {}", regime, one, two);
            assert!(two >= three, "{:?}: {} < {}", regime, two, three);
        }
    }

    #[test]
    fn every_decision_names_its_branch() {
        let decision = gate().accept(&result(&["massive"], 70.0, 1.0, Regime::Ranging));
        assert!(decision.reason.contains("SingleSource"));
        assert!(decision.reason.contains("80"));
    }
}
