//! Regional composite scoring.
//!
//! Missing optional metrics degrade precision, never block scoring: absent
//! metrics drop out of the weight table and the remaining weights are
//! renormalized to sum to 1 before the weighted sum. Regions with nothing
//! present are excluded from the result set entirely.

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use reelsignal_common::policy::ScoringPolicy;
use reelsignal_common::types::{Metric, RegionScore, Tier};

pub struct RegionalScorer {
    policy: ScoringPolicy,
}

impl RegionalScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Inclusive lower bounds: a score sitting exactly on a band boundary
    /// resolves to the higher tier.
    pub fn tier_for(&self, composite: f64) -> Tier {
        if composite >= self.policy.tier_a_min {
            Tier::A
        } else if composite >= self.policy.tier_b_min {
            Tier::B
        } else if composite >= self.policy.tier_c_min {
            Tier::C
        } else {
            Tier::D
        }
    }

    /// Score one region from whatever normalized metrics it has. Returns
    /// None when no weighted metric is present; the region is excluded,
    /// not scored as zero.
    pub fn score(
        &self,
        region_code: &str,
        available: &BTreeMap<Metric, f64>,
        supporting_signal_ids: Vec<Uuid>,
    ) -> Option<RegionScore> {
        let present: Vec<(Metric, f64, f64)> = self
            .policy
            .metric_weights
            .iter()
            .filter_map(|(metric, weight)| {
                available.get(metric).map(|value| (*metric, *weight, *value))
            })
            .collect();
        if present.is_empty() {
            debug!(region = region_code, "No weighted metrics present, excluding region");
            return None;
        }

        let weight_sum: f64 = present.iter().map(|(_, w, _)| w).sum();
        let mut component_breakdown = BTreeMap::new();
        let mut composite = 0.0;
        for (metric, weight, value) in present {
            let contribution = (weight / weight_sum) * value.clamp(0.0, 1.0);
            composite += contribution;
            component_breakdown.insert(metric, contribution);
        }
        let composite = composite.clamp(0.0, 1.0);

        Some(RegionScore {
            region_code: region_code.to_string(),
            composite_score: composite,
            tier: self.tier_for(composite),
            component_breakdown,
            supporting_signal_ids,
        })
    }

    /// Deterministic total order: composite descending, then tier, then
    /// region code. This is the only ordering the planner relies on.
    pub fn rank(&self, mut scores: Vec<RegionScore>) -> Vec<RegionScore> {
        scores.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then(a.tier.cmp(&b.tier))
                .then(a.region_code.cmp(&b.region_code))
        });
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> RegionalScorer {
        RegionalScorer::new(ScoringPolicy::default())
    }

    fn metrics(pairs: &[(Metric, f64)]) -> BTreeMap<Metric, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn full_metric_set_scores_in_unit_range() {
        let available = metrics(&[
            (Metric::SearchInterest, 0.9),
            (Metric::EngagementRate, 0.8),
            (Metric::SentimentScore, 0.85),
            (Metric::PageviewIndex, 0.7),
            (Metric::Momentum, 0.6),
        ]);
        let score = scorer().score("US", &available, vec![]).unwrap();
        assert!(score.composite_score > 0.0 && score.composite_score <= 1.0);
        let weight_total: f64 = score.component_breakdown.values().sum();
        assert!((weight_total - score.composite_score).abs() < 1e-9);
    }

    #[test]
    fn missing_metrics_renormalize_weights() {
        // Only two metrics present, both at 1.0: renormalized weights must
        // sum to 1, so the composite is exactly 1.0.
        let available = metrics(&[(Metric::SearchInterest, 1.0), (Metric::EngagementRate, 1.0)]);
        let score = scorer().score("GB", &available, vec![]).unwrap();
        assert!((score.composite_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unweighted_metrics_are_ignored() {
        let available = metrics(&[(Metric::CatalogPopularity, 0.9)]);
        assert!(scorer().score("US", &available, vec![]).is_none());
    }

    #[test]
    fn region_with_no_metrics_is_excluded() {
        assert!(scorer().score("AQ", &metrics(&[]), vec![]).is_none());
    }

    #[test]
    fn band_boundaries_resolve_to_the_higher_tier() {
        let s = scorer();
        assert_eq!(s.tier_for(0.75), Tier::A);
        assert_eq!(s.tier_for(0.7499), Tier::B);
        assert_eq!(s.tier_for(0.50), Tier::B);
        assert_eq!(s.tier_for(0.25), Tier::C);
        assert_eq!(s.tier_for(0.2499), Tier::D);
    }

    #[test]
    fn ranking_is_deterministic_with_ties() {
        let s = scorer();
        let mk = |code: &str, value: f64| {
            s.score(code, &metrics(&[(Metric::SearchInterest, value)]), vec![])
                .unwrap()
        };
        let ranked = s.rank(vec![mk("MX", 0.6), mk("BR", 0.6), mk("US", 0.9)]);
        let codes: Vec<&str> = ranked.iter().map(|r| r.region_code.as_str()).collect();
        assert_eq!(codes, vec!["US", "BR", "MX"]);
    }
}
