//! Deterministic mock sources for collector and pipeline tests: no network,
//! no credentials, no clock dependence beyond tokio's paused time.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use reelsignal_common::types::{Metric, SignalStatus, SourceId};
use reelsignal_sources::{
    FetchContext, SignalDraft, SignalSource, SourceBatch, SourceError, TrendPoint,
};

/// Builder for a one-draft batch, the common case in tests.
pub fn metric_batch(
    source_id: SourceId,
    region: Option<&str>,
    metric: Metric,
    value: f64,
) -> SourceBatch {
    let mut batch = SourceBatch::new(source_id);
    batch.drafts.push(SignalDraft {
        source_id,
        region: region.map(|r| r.to_string()),
        metric,
        value,
        unit: "index".to_string(),
        collected_at: Utc::now(),
        status: SignalStatus::Ok,
    });
    batch
}

/// A linear daily series ending now, for trend-detector fixtures.
pub fn linear_series(len: usize, start: f64, step: f64) -> Vec<TrendPoint> {
    let begin = Utc::now() - chrono::Duration::days(len as i64);
    (0..len)
        .map(|i| TrendPoint {
            at: begin + chrono::Duration::days(i as i64),
            value: start + step * i as f64,
        })
        .collect()
}

// --- StaticSource ---

/// Always succeeds on the first attempt with a fixed batch.
pub struct StaticSource {
    id: SourceId,
    required: bool,
    batch: SourceBatch,
}

impl StaticSource {
    pub fn required(id: SourceId) -> Self {
        Self::with_batch(id, true, metric_batch(id, None, Metric::CatalogPopularity, 0.8))
    }

    pub fn optional(id: SourceId) -> Self {
        Self::with_batch(id, false, metric_batch(id, Some("US"), Metric::PageviewIndex, 0.6))
    }

    pub fn with_batch(id: SourceId, required: bool, batch: SourceBatch) -> Self {
        Self { id, required, batch }
    }
}

#[async_trait]
impl SignalSource for StaticSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn is_required(&self) -> bool {
        self.required
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<SourceBatch, SourceError> {
        Ok(self.batch.clone())
    }
}

// --- FlakySource ---

/// Fails transiently (rate-limited) a fixed number of times, then succeeds.
/// Counts every fetch call so tests can assert exact attempt accounting.
pub struct FlakySource {
    id: SourceId,
    required: bool,
    failures_before_success: u32,
    calls: AtomicU32,
    batch: SourceBatch,
}

impl FlakySource {
    pub fn new(id: SourceId, required: bool, failures_before_success: u32) -> Self {
        Self {
            id,
            required,
            failures_before_success,
            calls: AtomicU32::new(0),
            batch: metric_batch(id, Some("US"), Metric::SearchInterest, 0.7),
        }
    }

    pub fn with_batch(mut self, batch: SourceBatch) -> Self {
        self.batch = batch;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for FlakySource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn is_required(&self) -> bool {
        self.required
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<SourceBatch, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            Err(SourceError::RateLimited)
        } else {
            Ok(self.batch.clone())
        }
    }
}

// --- NeverSource ---

/// Hangs forever; only the collector's timeouts or cancellation end it.
pub struct NeverSource {
    id: SourceId,
    required: bool,
}

impl NeverSource {
    pub fn required(id: SourceId) -> Self {
        Self { id, required: true }
    }

    pub fn optional(id: SourceId) -> Self {
        Self { id, required: false }
    }
}

#[async_trait]
impl SignalSource for NeverSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn is_required(&self) -> bool {
        self.required
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<SourceBatch, SourceError> {
        std::future::pending::<()>().await;
        unreachable!("pending future resolved")
    }
}
