//! Central tuning knobs for scoring, trend detection, and rollout planning.
//!
//! These are policy values, not invariants. Defaults reflect what the system
//! ships with; callers may override any of them through `ScoringPolicy`
//! before handing the config to the pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::Metric;

/// Tier bands over the composite score. Inclusive lower bounds, so a score
/// sitting exactly on a boundary resolves to the higher tier.
pub const TIER_A_MIN: f64 = 0.75;
pub const TIER_B_MIN: f64 = 0.50;
pub const TIER_C_MIN: f64 = 0.25;

/// Sentiment label cutoffs: score above +0.05 is positive, below -0.05
/// negative, otherwise neutral.
pub const SENTIMENT_POSITIVE_MIN: f64 = 0.05;
pub const SENTIMENT_NEGATIVE_MAX: f64 = -0.05;

/// Trailing window size (points) for momentum: last K vs the prior K.
pub const TREND_WINDOW: usize = 7;

/// Z-score above which the latest point counts as a spike.
pub const SPIKE_Z_THRESHOLD: f64 = 2.0;

/// Signals older than this are considered stale for confidence purposes.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Retry budget per source: total attempts, not retries-after-first.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Front-loaded weekly budget curve. One entry per rollout phase; sums to 1.
pub const BUDGET_CURVE: [f64; 6] = [0.30, 0.22, 0.16, 0.13, 0.10, 0.09];

/// Number of phases (one per week) every rollout plan carries.
pub const ROLLOUT_PHASES: usize = 6;

#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    /// Relative weight per metric; renormalized over whatever is present
    /// for a given region.
    pub metric_weights: BTreeMap<Metric, f64>,
    pub tier_a_min: f64,
    pub tier_b_min: f64,
    pub tier_c_min: f64,
    pub trend_window: usize,
    pub spike_z_threshold: f64,
    pub freshness_window: Duration,
    pub budget_curve: [f64; 6],
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let mut metric_weights = BTreeMap::new();
        metric_weights.insert(Metric::SearchInterest, 0.30);
        metric_weights.insert(Metric::EngagementRate, 0.25);
        metric_weights.insert(Metric::SentimentScore, 0.20);
        metric_weights.insert(Metric::PageviewIndex, 0.15);
        metric_weights.insert(Metric::Momentum, 0.10);
        Self {
            metric_weights,
            tier_a_min: TIER_A_MIN,
            tier_b_min: TIER_B_MIN,
            tier_c_min: TIER_C_MIN,
            trend_window: TREND_WINDOW,
            spike_z_threshold: SPIKE_Z_THRESHOLD,
            freshness_window: FRESHNESS_WINDOW,
            budget_curve: BUDGET_CURVE,
        }
    }
}
