//! Momentum and spike detection over a time-ordered interest series.

use reelsignal_sources::TrendPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReport {
    /// Normalized slope of the trailing window vs the prior window, [-1, 1].
    pub momentum: f64,
    pub is_spike: bool,
}

impl TrendReport {
    fn flat() -> Self {
        Self {
            momentum: 0.0,
            is_spike: false,
        }
    }
}

pub struct TrendDetector {
    window: usize,
    z_threshold: f64,
}

impl TrendDetector {
    pub fn new(window: usize, z_threshold: f64) -> Self {
        Self {
            window: window.max(1),
            z_threshold,
        }
    }

    /// Series shorter than two windows is insufficient data, reported as
    /// flat rather than as an error.
    pub fn detect(&self, series: &[TrendPoint]) -> TrendReport {
        let k = self.window;
        if series.len() < 2 * k {
            return TrendReport::flat();
        }

        let recent = &series[series.len() - k..];
        let prior = &series[series.len() - 2 * k..series.len() - k];
        let recent_mean = mean(recent);
        let prior_mean = mean(prior);

        let momentum = if prior_mean.abs() < f64::EPSILON {
            if recent_mean > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            ((recent_mean - prior_mean) / prior_mean.abs()).clamp(-1.0, 1.0)
        };

        // Spike: the latest point deviates from the trailing mean by more
        // than z_threshold standard deviations. The latest point is excluded
        // from its own baseline.
        let baseline = &series[series.len() - 2 * k..series.len() - 1];
        let base_mean = mean(baseline);
        let variance = baseline
            .iter()
            .map(|p| (p.value - base_mean).powi(2))
            .sum::<f64>()
            / baseline.len() as f64;
        let std_dev = variance.sqrt();
        let latest = series[series.len() - 1].value;
        let is_spike = std_dev > f64::EPSILON && (latest - base_mean) / std_dev > self.z_threshold;

        TrendReport { momentum, is_spike }
    }
}

fn mean(points: &[TrendPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64
}
