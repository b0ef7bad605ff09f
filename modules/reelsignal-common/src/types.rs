use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Source identity ---

/// The closed set of external data providers. Adding a provider means adding
/// a variant here and a fetcher in `reelsignal-sources`, never subclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Movie metadata catalog (title, popularity, votes).
    Metadata,
    /// Trailer video engagement (views, likes, comments).
    Engagement,
    /// Search-interest index per region.
    SearchTrends,
    /// Encyclopedia pageview index.
    Pageviews,
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Metadata => write!(f, "metadata"),
            SourceId::Engagement => write!(f, "engagement"),
            SourceId::SearchTrends => write!(f, "search_trends"),
            SourceId::Pageviews => write!(f, "pageviews"),
        }
    }
}

// --- Metrics ---

/// A comparable metric name. Raw drafts and derived analyzer outputs both
/// register under one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SearchInterest,
    PageviewIndex,
    EngagementRate,
    SentimentScore,
    Momentum,
    /// Global anticipation prior from the metadata catalog. Backs claims;
    /// carries no weight in regional scoring.
    CatalogPopularity,
    /// Global rating-count index from the metadata catalog.
    FanbaseSize,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::SearchInterest => write!(f, "search_interest"),
            Metric::PageviewIndex => write!(f, "pageview_index"),
            Metric::EngagementRate => write!(f, "engagement_rate"),
            Metric::SentimentScore => write!(f, "sentiment_score"),
            Metric::Momentum => write!(f, "momentum"),
            Metric::CatalogPopularity => write!(f, "catalog_popularity"),
            Metric::FanbaseSize => write!(f, "fanbase_size"),
        }
    }
}

// --- Signals ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Ok,
    /// The source answered but had no value for this metric/region.
    Missing,
    /// The source answered with reduced fidelity (partial data, fallback path).
    Degraded,
}

/// One raw or lightly-normalized measurement from a single source.
/// Immutable once registered; retained for the lifetime of one campaign run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub source_id: SourceId,
    /// ISO country code for regional metrics, None for global ones.
    pub region: Option<String>,
    pub metric: Metric,
    pub value: f64,
    pub unit: String,
    pub collected_at: DateTime<Utc>,
    pub status: SignalStatus,
}

impl Signal {
    pub fn key(&self) -> SignalKey {
        SignalKey {
            source_id: self.source_id,
            metric: self.metric,
            region: self.region.clone(),
            collected_at: self.collected_at,
        }
    }
}

/// Idempotency key for signal registration. Registering the same key twice
/// returns the existing id rather than creating a duplicate record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub source_id: SourceId,
    pub metric: Metric,
    pub region: Option<String>,
    pub collected_at: DateTime<Utc>,
}

// --- Claims ---

/// A statement surfaced to the consumer, backed by one or more signals.
/// Invariant: `supporting_signal_ids` is never empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub text: String,
    pub supporting_signal_ids: Vec<Uuid>,
    pub confidence: f32,
}

// --- Regional scoring ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::A => write!(f, "A"),
            Tier::B => write!(f, "B"),
            Tier::C => write!(f, "C"),
            Tier::D => write!(f, "D"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionScore {
    pub region_code: String,
    /// Weighted composite over present metrics, in [0, 1].
    pub composite_score: f64,
    pub tier: Tier,
    /// Per-metric normalized contribution (renormalized weight x value).
    pub component_breakdown: BTreeMap<Metric, f64>,
    pub supporting_signal_ids: Vec<Uuid>,
}

// --- Rollout planning ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutPhase {
    /// 1-based, always 1..=6.
    pub phase_index: u8,
    pub name: String,
    /// Inclusive (start_week, end_week); one week per phase.
    pub week_range: (u8, u8),
    /// Ranked region codes active in this phase.
    pub target_regions: Vec<String>,
    pub budget_fraction: f64,
    pub activities: Vec<String>,
}

// --- Pipeline status & progress ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Collecting,
    Aggregating,
    Scoring,
    Planning,
    Complete,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::Collecting => write!(f, "collecting"),
            Stage::Aggregating => write!(f, "aggregating"),
            Stage::Scoring => write!(f, "scoring"),
            Stage::Planning => write!(f, "planning"),
            Stage::Complete => write!(f, "complete"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// Stage-transition event published to progress subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    RequiredSourceFailed { source: SourceId },
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::RequiredSourceFailed { source } => {
                write!(f, "required source {source} failed")
            }
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PipelineStatus {
    Complete,
    Failed { reason: FailureReason },
}

// --- Source outcomes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    Succeeded,
    /// An OPTIONAL source exhausted its retry budget; recorded as missing data.
    FailedSoft,
    /// A REQUIRED source exhausted its retry budget; the run aborts.
    FailedHard,
    /// Still outstanding when the overall deadline elapsed.
    TimedOut,
}

impl std::fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceOutcome::Succeeded => write!(f, "succeeded"),
            SourceOutcome::FailedSoft => write!(f, "failed_soft"),
            SourceOutcome::FailedHard => write!(f, "failed_hard"),
            SourceOutcome::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Per-source result record, kept on the campaign so consumers can render
/// "data unavailable" instead of silently omitting context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub outcome: SourceOutcome,
    /// Underlying fetch attempts, including the successful one.
    pub attempts: u32,
    pub detail: Option<String>,
}

// --- Campaign ---

/// Owns every record produced by one pipeline run. Replaced wholesale on the
/// next run; never mutated after `pipeline_status` reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub signals: Vec<Signal>,
    pub claims: Vec<Claim>,
    pub region_scores: Vec<RegionScore>,
    pub phases: Vec<RolloutPhase>,
    pub source_statuses: BTreeMap<SourceId, SourceStatus>,
    pub pipeline_status: PipelineStatus,
}
