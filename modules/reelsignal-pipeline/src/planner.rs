//! Time-phased rollout planning.
//!
//! Always exactly six one-week phases. Budget follows the front-loaded
//! policy curve; targeting starts with the top-ranked regions and widens
//! every week until the full ranked set is active. An empty ranking still
//! yields a valid schedule; empty targets and no activities signal "no
//! regional prioritization available" without an error.

use tracing::debug;

use reelsignal_common::policy::{ScoringPolicy, ROLLOUT_PHASES};
use reelsignal_common::types::{RegionScore, RolloutPhase};

const PHASE_NAMES: [&str; ROLLOUT_PHASES] = [
    "Fan Ignition",
    "Trailer Amplification",
    "Social Proof Expansion",
    "Pre-Sale Push",
    "Premiere Week",
    "Release Sustain",
];

/// Fixed activity ladder per phase index. Emitted only when the phase has
/// target regions to act in.
const PHASE_ACTIVITIES: [&[&str]; ROLLOUT_PHASES] = [
    &[
        "Launch teaser campaign",
        "Build social media presence",
        "Secure media partnerships",
    ],
    &[
        "Release official trailer",
        "Start paid social campaigns",
        "Begin PR tour",
    ],
    &[
        "Localize social proof clips",
        "Amplify critic quotes",
        "Expand influencer partnerships",
    ],
    &[
        "Intensify digital ads",
        "Launch ticket pre-sales",
        "Host premiere events",
    ],
    &[
        "Final push across all channels",
        "Leverage reviews and testimonials",
        "Drive ticket sales",
    ],
    &[
        "Sustain retargeting",
        "Run community fan drops",
        "Maximize opening-weekend reach",
    ],
];

pub struct RolloutPlanner {
    policy: ScoringPolicy,
}

impl RolloutPlanner {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Build the six-phase schedule from ranked region scores. The input
    /// must already be in planner order (the scorer's `rank`); the planner
    /// itself never reorders.
    pub fn plan(&self, ranked: &[RegionScore]) -> Vec<RolloutPhase> {
        let total = ranked.len();
        let mut phases = Vec::with_capacity(ROLLOUT_PHASES);

        for (i, budget_fraction) in self.policy.budget_curve.iter().enumerate() {
            let phase_index = (i + 1) as u8;
            // Widening top-N: phase k covers the top ceil(total * k / 6).
            let take = (total * (i + 1)).div_ceil(ROLLOUT_PHASES);
            let target_regions: Vec<String> = ranked
                .iter()
                .take(take)
                .map(|r| r.region_code.clone())
                .collect();
            let activities: Vec<String> = if target_regions.is_empty() {
                Vec::new()
            } else {
                PHASE_ACTIVITIES[i].iter().map(|a| a.to_string()).collect()
            };

            debug!(
                phase = phase_index,
                regions = target_regions.len(),
                budget_fraction,
                "Planned rollout phase"
            );
            phases.push(RolloutPhase {
                phase_index,
                name: PHASE_NAMES[i].to_string(),
                week_range: (phase_index, phase_index),
                target_regions,
                budget_fraction: *budget_fraction,
                activities,
            });
        }

        phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsignal_common::types::Tier;
    use std::collections::BTreeMap;

    fn region(code: &str, composite: f64, tier: Tier) -> RegionScore {
        RegionScore {
            region_code: code.to_string(),
            composite_score: composite,
            tier,
            component_breakdown: BTreeMap::new(),
            supporting_signal_ids: vec![],
        }
    }

    fn planner() -> RolloutPlanner {
        RolloutPlanner::new(ScoringPolicy::default())
    }

    fn assert_budget_sums_to_one(phases: &[RolloutPhase]) {
        let total: f64 = phases.iter().map(|p| p.budget_fraction).sum();
        assert!((total - 1.0).abs() <= 0.01, "budget sum {total}");
    }

    #[test]
    fn always_six_phases_summing_to_one() {
        let ranked = vec![
            region("US", 0.9, Tier::A),
            region("GB", 0.7, Tier::B),
            region("BR", 0.4, Tier::C),
        ];
        let phases = planner().plan(&ranked);
        assert_eq!(phases.len(), 6);
        assert_budget_sums_to_one(&phases);
        for (i, phase) in phases.iter().enumerate() {
            assert_eq!(phase.phase_index as usize, i + 1);
            assert_eq!(phase.week_range, (phase.phase_index, phase.phase_index));
        }
    }

    #[test]
    fn empty_input_yields_valid_empty_schedule() {
        let phases = planner().plan(&[]);
        assert_eq!(phases.len(), 6);
        assert_budget_sums_to_one(&phases);
        for phase in &phases {
            assert!(phase.target_regions.is_empty());
            assert!(phase.activities.is_empty());
        }
    }

    #[test]
    fn targeting_widens_over_time() {
        let ranked = vec![
            region("US", 0.9, Tier::A),
            region("GB", 0.8, Tier::A),
            region("DE", 0.6, Tier::B),
            region("FR", 0.55, Tier::B),
            region("BR", 0.4, Tier::C),
            region("IN", 0.3, Tier::C),
        ];
        let phases = planner().plan(&ranked);
        assert_eq!(phases[0].target_regions, vec!["US"]);
        assert_eq!(phases[1].target_regions, vec!["US", "GB"]);
        assert_eq!(phases[5].target_regions.len(), 6);
        for pair in phases.windows(2) {
            assert!(pair[0].target_regions.len() <= pair[1].target_regions.len());
        }
    }

    #[test]
    fn budget_is_front_loaded() {
        let phases = planner().plan(&[region("US", 0.9, Tier::A)]);
        for pair in phases.windows(2) {
            assert!(pair[0].budget_fraction >= pair[1].budget_fraction);
        }
    }

    #[test]
    fn single_region_is_targeted_from_phase_one() {
        let phases = planner().plan(&[region("JP", 0.5, Tier::B)]);
        for phase in &phases {
            assert_eq!(phase.target_regions, vec!["JP"]);
            assert!(!phase.activities.is_empty());
        }
    }
}
