// The SignalSource capability seam. Every external provider sits behind this
// one trait; the collector only ever sees trait objects, which is what makes
// deterministic testing with mock sources possible: no network, no keys.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;

use reelsignal_common::types::{Metric, SignalStatus, SourceId};

use crate::cache::FetchCache;
use crate::error::Result;

// --- Fetch context ---

/// Shared per-run fetch environment: one HTTP client, one TTL cache, the
/// region list. Passed by reference to every source; sources own their
/// credentials, not the context.
#[derive(Clone)]
pub struct FetchContext {
    pub http: reqwest::Client,
    pub cache: Arc<FetchCache>,
    pub regions: Vec<String>,
}

impl FetchContext {
    pub fn new(cache: Arc<FetchCache>, regions: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache,
            regions,
        }
    }
}

// --- Batch payloads ---

/// An unregistered measurement as produced by a source. The tracker assigns
/// the id and enforces idempotence when the draft is registered.
#[derive(Debug, Clone)]
pub struct SignalDraft {
    pub source_id: SourceId,
    pub region: Option<String>,
    pub metric: Metric,
    pub value: f64,
    pub unit: String,
    pub collected_at: DateTime<Utc>,
    pub status: SignalStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct TrendPoint {
    pub at: DateTime<Utc>,
    pub value: f64,
}

/// Everything one source produced in one fetch. Raw artifacts (comment text,
/// time series) ride alongside the metric drafts so downstream analyzers can
/// derive further tracked metrics from them.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source_id: SourceId,
    pub drafts: Vec<SignalDraft>,
    pub comments: Vec<String>,
    /// Region code -> time-ordered interest series.
    pub series: BTreeMap<String, Vec<TrendPoint>>,
}

impl SourceBatch {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            drafts: Vec::new(),
            comments: Vec::new(),
            series: BTreeMap::new(),
        }
    }
}

// --- Retry policy ---

/// Bounded exponential backoff. `max_attempts` counts every attempt,
/// including the first; `backoff(1)` is the delay after the first failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: reelsignal_common::policy::RETRY_MAX_ATTEMPTS,
            base_backoff: reelsignal_common::policy::RETRY_BASE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry: base * 2^(attempt-1) plus 0-250ms jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_backoff * 2u32.pow(attempt.saturating_sub(1));
        let jitter = Duration::from_millis(rand::rng().random_range(0..250));
        exp + jitter
    }
}

// --- The source trait ---

#[async_trait]
pub trait SignalSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// REQUIRED sources abort the run when their retry budget is exhausted;
    /// OPTIONAL sources degrade to missing data.
    fn is_required(&self) -> bool;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// One fetch attempt. Timeout enforcement and retries live in the
    /// collector, not here.
    async fn fetch(&self, ctx: &FetchContext) -> Result<SourceBatch>;
}
