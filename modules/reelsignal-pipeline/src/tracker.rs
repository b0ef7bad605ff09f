//! Signal registry and provenance.
//!
//! Every accepted measurement is registered here with a stable id; claims
//! reference signal ids, never values, so provenance stays unidirectional.
//! The tracker is written during collection/aggregation and read-only
//! afterwards, so no locking is needed once scoring starts.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use reelsignal_common::error::ReelSignalError;
use reelsignal_common::policy::ScoringPolicy;
use reelsignal_common::types::{Claim, Metric, Signal, SignalKey, SignalStatus, SourceId};
use reelsignal_sources::SignalDraft;

/// Confidence model: base support for a single fresh source, a bonus per
/// additional independent source (capped), multiplied by mean freshness and
/// discounted for degraded or missing citations.
const CONFIDENCE_BASE: f32 = 0.35;
const CONFIDENCE_SOURCE_BONUS: f32 = 0.15;
const CONFIDENCE_SOURCE_BONUS_CAP: u32 = 3;
const DEGRADED_PENALTY: f32 = 0.15;
const MISSING_PENALTY: f32 = 0.30;

pub struct SourceTracker {
    policy: ScoringPolicy,
    signals: HashMap<Uuid, Signal>,
    index: HashMap<SignalKey, Uuid>,
    claims: Vec<Claim>,
}

impl SourceTracker {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            signals: HashMap::new(),
            index: HashMap::new(),
            claims: Vec::new(),
        }
    }

    /// Register a draft and return its signal id. Idempotent per
    /// (source_id, metric, region, collected_at): re-registering the same
    /// key returns the existing id without touching the stored record.
    pub fn register(&mut self, draft: SignalDraft) -> Uuid {
        let signal = Signal {
            id: Uuid::new_v4(),
            source_id: draft.source_id,
            region: draft.region,
            metric: draft.metric,
            value: draft.value,
            unit: draft.unit,
            collected_at: draft.collected_at,
            status: draft.status,
        };
        let key = signal.key();
        if let Some(existing) = self.index.get(&key) {
            debug!(source = %signal.source_id, metric = %signal.metric, "Duplicate signal key, keeping existing record");
            return *existing;
        }
        let id = signal.id;
        self.index.insert(key, id);
        self.signals.insert(id, signal);
        id
    }

    pub fn signal(&self, id: Uuid) -> Option<&Signal> {
        self.signals.get(&id)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// All signals in a stable order (source, metric, region) so campaign
    /// output does not depend on registration order.
    pub fn signals(&self) -> Vec<Signal> {
        let mut all: Vec<Signal> = self.signals.values().cloned().collect();
        all.sort_by(|a, b| {
            (a.source_id, a.metric, &a.region, a.collected_at).cmp(&(
                b.source_id,
                b.metric,
                &b.region,
                b.collected_at,
            ))
        });
        all
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Ids of OK signals carrying the given metric for the given region
    /// (None matches global signals).
    pub fn ids_for(&self, metric: Metric, region: Option<&str>) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .signals
            .values()
            .filter(|s| {
                s.metric == metric
                    && s.status == SignalStatus::Ok
                    && s.region.as_deref() == region
            })
            .map(|s| s.id)
            .collect();
        ids.sort();
        ids
    }

    /// Latest OK value for a metric/region, if any. Ties on collection time
    /// break on source id so the pick does not depend on map order.
    pub fn value_for(&self, metric: Metric, region: Option<&str>) -> Option<f64> {
        self.signals
            .values()
            .filter(|s| {
                s.metric == metric
                    && s.status == SignalStatus::Ok
                    && s.region.as_deref() == region
            })
            .max_by_key(|s| (s.collected_at, s.source_id))
            .map(|s| s.value)
    }

    /// Attach a claim backed by the given signals. Rejects an empty id set
    /// and ids that do not resolve: a claim without provenance is invalid.
    pub fn attach(
        &mut self,
        text: impl Into<String>,
        signal_ids: &[Uuid],
    ) -> Result<Claim, ReelSignalError> {
        if signal_ids.is_empty() {
            return Err(ReelSignalError::Validation(
                "claim requires at least one supporting signal".to_string(),
            ));
        }
        for id in signal_ids {
            if !self.signals.contains_key(id) {
                return Err(ReelSignalError::Validation(format!(
                    "claim references unknown signal {id}"
                )));
            }
        }

        let confidence = self.confidence(signal_ids);
        let mut ids: Vec<Uuid> = signal_ids.to_vec();
        ids.sort();
        ids.dedup();
        let claim = Claim {
            id: Uuid::new_v4(),
            text: text.into(),
            supporting_signal_ids: ids,
            confidence,
        };
        self.claims.push(claim.clone());
        Ok(claim)
    }

    /// Provenance-weighted confidence for a set of signal ids. Deterministic
    /// and order-independent: the cited set is deduplicated before scoring,
    /// so the same set always yields the same score.
    pub fn confidence(&self, signal_ids: &[Uuid]) -> f32 {
        let ids: BTreeSet<Uuid> = signal_ids.iter().copied().collect();
        let cited: Vec<&Signal> = ids.iter().filter_map(|id| self.signals.get(id)).collect();
        if cited.is_empty() {
            return 0.0;
        }

        let distinct_sources: BTreeSet<SourceId> = cited
            .iter()
            .filter(|s| s.status != SignalStatus::Missing)
            .map(|s| s.source_id)
            .collect();
        if distinct_sources.is_empty() {
            return 0.0;
        }

        let bonus_sources = (distinct_sources.len() as u32 - 1).min(CONFIDENCE_SOURCE_BONUS_CAP);
        let base = CONFIDENCE_BASE + CONFIDENCE_SOURCE_BONUS * bonus_sources as f32;

        // Mean freshness: 1.0 inside the window, then inverse decay.
        let window_secs = self.policy.freshness_window.as_secs_f64();
        let now = Utc::now();
        let freshness: f64 = cited
            .iter()
            .map(|s| {
                let age = (now - s.collected_at).num_seconds().max(0) as f64;
                if age <= window_secs {
                    1.0
                } else {
                    (window_secs / age).max(0.05)
                }
            })
            .sum::<f64>()
            / cited.len() as f64;

        let degraded = cited
            .iter()
            .filter(|s| s.status == SignalStatus::Degraded)
            .count() as f32
            / cited.len() as f32;
        let missing = cited
            .iter()
            .filter(|s| s.status == SignalStatus::Missing)
            .count() as f32
            / cited.len() as f32;
        let penalty = (1.0 - DEGRADED_PENALTY * degraded - MISSING_PENALTY * missing).max(0.0);

        (base * freshness as f32 * penalty).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn draft(
        source_id: SourceId,
        metric: Metric,
        region: Option<&str>,
        status: SignalStatus,
    ) -> SignalDraft {
        SignalDraft {
            source_id,
            region: region.map(|r| r.to_string()),
            metric,
            value: 0.5,
            unit: "index".to_string(),
            collected_at: Utc::now(),
            status,
        }
    }

    fn tracker() -> SourceTracker {
        SourceTracker::new(ScoringPolicy::default())
    }

    #[test]
    fn register_is_idempotent_per_key() {
        let mut t = tracker();
        let d = draft(
            SourceId::SearchTrends,
            Metric::SearchInterest,
            Some("US"),
            SignalStatus::Ok,
        );
        let first = t.register(d.clone());
        let second = t.register(d);
        assert_eq!(first, second);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn attach_rejects_empty_set() {
        let mut t = tracker();
        assert!(t.attach("unsupported claim", &[]).is_err());
    }

    #[test]
    fn attach_rejects_unknown_ids() {
        let mut t = tracker();
        assert!(t.attach("phantom provenance", &[Uuid::new_v4()]).is_err());
    }

    #[test]
    fn attach_succeeds_with_resolvable_ids() {
        let mut t = tracker();
        let id = t.register(draft(
            SourceId::Engagement,
            Metric::EngagementRate,
            None,
            SignalStatus::Ok,
        ));
        let claim = t.attach("strong engagement", &[id]).unwrap();
        assert_eq!(claim.supporting_signal_ids, vec![id]);
        assert!(claim.confidence > 0.0);
    }

    #[test]
    fn confidence_is_order_independent() {
        let mut t = tracker();
        let a = t.register(draft(
            SourceId::SearchTrends,
            Metric::SearchInterest,
            Some("US"),
            SignalStatus::Ok,
        ));
        let b = t.register(draft(
            SourceId::Pageviews,
            Metric::PageviewIndex,
            Some("US"),
            SignalStatus::Ok,
        ));
        assert_eq!(t.confidence(&[a, b]), t.confidence(&[b, a]));
        // Duplicated citations don't inflate the score either.
        assert_eq!(t.confidence(&[a, b]), t.confidence(&[a, b, a]));
    }

    #[test]
    fn more_independent_sources_raise_confidence() {
        let mut t = tracker();
        let a = t.register(draft(
            SourceId::SearchTrends,
            Metric::SearchInterest,
            Some("US"),
            SignalStatus::Ok,
        ));
        let b = t.register(draft(
            SourceId::Pageviews,
            Metric::PageviewIndex,
            Some("US"),
            SignalStatus::Ok,
        ));
        assert!(t.confidence(&[a, b]) > t.confidence(&[a]));
    }

    #[test]
    fn degraded_and_missing_citations_lower_confidence() {
        let mut t = tracker();
        let ok = t.register(draft(
            SourceId::Engagement,
            Metric::EngagementRate,
            None,
            SignalStatus::Ok,
        ));
        let degraded = t.register(draft(
            SourceId::Metadata,
            Metric::CatalogPopularity,
            None,
            SignalStatus::Degraded,
        ));
        let missing = t.register(draft(
            SourceId::SearchTrends,
            Metric::SearchInterest,
            Some("US"),
            SignalStatus::Missing,
        ));
        let clean = t.confidence(&[ok]);
        assert!(t.confidence(&[ok, degraded]) < t.confidence(&[ok]) + CONFIDENCE_SOURCE_BONUS);
        assert!(t.confidence(&[ok, missing]) < t.confidence(&[ok, degraded]));
        assert!(clean > 0.0);
    }

    #[test]
    fn stale_signals_decay_confidence() {
        let mut t = tracker();
        let mut old = draft(
            SourceId::Pageviews,
            Metric::PageviewIndex,
            Some("US"),
            SignalStatus::Ok,
        );
        old.collected_at = Utc::now() - ChronoDuration::days(10);
        let fresh = t.register(draft(
            SourceId::SearchTrends,
            Metric::SearchInterest,
            Some("US"),
            SignalStatus::Ok,
        ));
        let stale = t.register(old);
        assert!(t.confidence(&[stale]) < t.confidence(&[fresh]));
    }

    #[test]
    fn signals_come_back_in_stable_order() {
        let mut t = tracker();
        t.register(draft(
            SourceId::Pageviews,
            Metric::PageviewIndex,
            Some("US"),
            SignalStatus::Ok,
        ));
        t.register(draft(
            SourceId::Metadata,
            Metric::CatalogPopularity,
            None,
            SignalStatus::Ok,
        ));
        let all = t.signals();
        assert_eq!(all[0].source_id, SourceId::Metadata);
        assert_eq!(all[1].source_id, SourceId::Pageviews);
    }
}
