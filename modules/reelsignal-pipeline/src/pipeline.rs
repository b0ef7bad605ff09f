//! The campaign pipeline: validate, collect, aggregate, score, plan.
//!
//! Stages run strictly forward over immutable inputs. Only the collection
//! stage touches the network or runs concurrently; everything downstream is
//! a sequential pass over the already-materialized signal set.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use uuid::Uuid;

use reelsignal_common::error::ReelSignalError;
use reelsignal_common::types::{
    Campaign, FailureReason, Metric, PipelineStatus, RegionScore, SignalStatus, SourceId,
    SourceStatus, Stage, StageEvent,
};
use reelsignal_common::PipelineConfig;
use reelsignal_sources::{
    parse_video_ref, EngagementSource, FetchCache, FetchContext, MetadataSource, PageviewSource,
    SignalDraft, SignalSource, TrendSource,
};

use crate::collector::{self, CollectReport};
use crate::planner::RolloutPlanner;
use crate::scorer::RegionalScorer;
use crate::sentiment::SentimentAnalyzer;
use crate::stats::RunStats;
use crate::tracker::SourceTracker;
use crate::trend::TrendDetector;

/// Per-region metrics that come from region-scoped signals.
const REGIONAL_METRICS: [Metric; 3] = [
    Metric::SearchInterest,
    Metric::PageviewIndex,
    Metric::Momentum,
];

/// Metrics measured once per run and applied to every region.
const GLOBAL_METRICS: [Metric; 2] = [Metric::EngagementRate, Metric::SentimentScore];

pub struct Pipeline {
    config: PipelineConfig,
    sources: Vec<Arc<dyn SignalSource>>,
    cache: Arc<FetchCache>,
    progress: broadcast::Sender<StageEvent>,
}

impl Pipeline {
    /// Validate the config and build the configured source set. Fails before
    /// COLLECTING ever starts: a malformed video reference or a missing
    /// REQUIRED credential never launches a run.
    pub fn new(config: PipelineConfig) -> Result<Self, ReelSignalError> {
        let video_id = parse_video_ref(&config.video_ref)
            .map_err(ReelSignalError::Validation)?;

        let metadata_key = config
            .metadata_api_key
            .clone()
            .ok_or(ReelSignalError::MissingCredential(SourceId::Metadata))?;
        let engagement_key = config
            .engagement_api_key
            .clone()
            .ok_or(ReelSignalError::MissingCredential(SourceId::Engagement))?;

        let mut sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(MetadataSource::new(metadata_key, &config.title)),
            Arc::new(EngagementSource::new(engagement_key, video_id)),
        ];
        match &config.trends_api_key {
            Some(key) => {
                sources.push(Arc::new(TrendSource::new(key.clone(), &config.title)));
            }
            None => info!("No trends credential, search-interest source disabled"),
        }
        if config.pageviews_enabled {
            sources.push(Arc::new(PageviewSource::new(&config.title)));
        }

        Ok(Self::with_sources(config, sources))
    }

    /// Seam for tests and callers that bring their own sources.
    pub fn with_sources(config: PipelineConfig, sources: Vec<Arc<dyn SignalSource>>) -> Self {
        let cache = Arc::new(FetchCache::new(config.cache_ttl));
        let (progress, _) = broadcast::channel(16);
        Self {
            config,
            sources,
            cache,
            progress,
        }
    }

    /// Subscribe to stage-transition events. How (or whether) they are
    /// displayed is the boundary layer's business.
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.progress.subscribe()
    }

    pub async fn run(&self) -> Result<Campaign, ReelSignalError> {
        self.run_inner(None).await
    }

    /// Run with a cancellation channel. Flipping it to `true` propagates the
    /// same cooperative cancellation used for deadline expiry; a cancelled
    /// run is FAILED, never a partial COMPLETE.
    pub async fn run_with_cancel(
        &self,
        cancel: watch::Receiver<bool>,
    ) -> Result<Campaign, ReelSignalError> {
        self.run_inner(Some(cancel)).await
    }

    async fn run_inner(
        &self,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Campaign, ReelSignalError> {
        let mut stats = RunStats::default();
        self.emit(Stage::Init);

        // --- COLLECTING ---
        self.emit(Stage::Collecting);
        let ctx = FetchContext::new(Arc::clone(&self.cache), self.config.regions.clone());
        let report = collector::collect(
            &self.sources,
            &ctx,
            self.config.per_source_timeout,
            self.config.overall_deadline,
            cancel,
        )
        .await;
        stats.note_statuses(&report.statuses);

        if report.cancelled {
            warn!("Run cancelled during collection");
            self.emit(Stage::Failed);
            info!("{stats}");
            return Ok(self.failed_campaign(report.statuses, FailureReason::Cancelled));
        }
        if let Some(source) = report.hard_failure(&self.sources) {
            warn!(source = %source, "Required source failed, aborting run");
            self.emit(Stage::Failed);
            info!("{stats}");
            return Ok(self.failed_campaign(
                report.statuses,
                FailureReason::RequiredSourceFailed { source },
            ));
        }

        // --- AGGREGATING ---
        self.emit(Stage::Aggregating);
        let mut tracker = SourceTracker::new(self.config.policy.clone());
        self.aggregate(&report, &mut tracker, &mut stats);

        // --- SCORING ---
        self.emit(Stage::Scoring);
        let ranked = self.score_regions(&tracker, &mut stats);
        if let Some(top) = ranked.first() {
            if let Err(e) = tracker.attach(
                format!(
                    "Top priority region {} (tier {}, composite {:.2})",
                    top.region_code, top.tier, top.composite_score
                ),
                &top.supporting_signal_ids,
            ) {
                warn!(error = %e, "Dropped top-region claim");
            }
        }
        stats.claims_attached = tracker.claims().len() as u32;

        // --- PLANNING ---
        self.emit(Stage::Planning);
        let planner = RolloutPlanner::new(self.config.policy.clone());
        let phases = planner.plan(&ranked);

        self.emit(Stage::Complete);
        info!("{stats}");
        Ok(Campaign {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            signals: tracker.signals(),
            claims: tracker.claims().to_vec(),
            region_scores: ranked,
            phases,
            source_statuses: report.statuses,
            pipeline_status: PipelineStatus::Complete,
        })
    }

    /// Register raw drafts, derive sentiment and momentum from the batches'
    /// raw artifacts, and attach the run's claims. Derived metrics register
    /// like any other signal, so claims cite real provenance.
    fn aggregate(&self, report: &CollectReport, tracker: &mut SourceTracker, stats: &mut RunStats) {
        for batch in &report.batches {
            for draft in &batch.drafts {
                let before = tracker.len();
                tracker.register(draft.clone());
                if tracker.len() == before {
                    stats.signals_deduplicated += 1;
                } else {
                    stats.signals_registered += 1;
                }
            }
        }

        // Sentiment over the pooled comment sample.
        let mut comments: Vec<String> = Vec::new();
        let mut comment_source = None;
        for batch in &report.batches {
            if !batch.comments.is_empty() {
                comment_source.get_or_insert(batch.source_id);
                comments.extend(batch.comments.iter().cloned());
            }
        }
        if let Some(source_id) = comment_source {
            let sentiment = SentimentAnalyzer::default().analyze(&comments);
            stats.comments_analyzed = sentiment.sample_size as u32;
            let id = tracker.register(SignalDraft {
                source_id,
                region: None,
                metric: Metric::SentimentScore,
                value: sentiment.score,
                unit: "polarity".to_string(),
                collected_at: Utc::now(),
                status: SignalStatus::Ok,
            });
            stats.signals_registered += 1;
            let mut support = vec![id];
            support.extend(tracker.ids_for(Metric::EngagementRate, None));
            if let Err(e) = tracker.attach(
                format!(
                    "Audience sentiment {} ({:+.2}) across {} comments",
                    sentiment.label, sentiment.score, sentiment.sample_size
                ),
                &support,
            ) {
                warn!(error = %e, "Dropped sentiment claim");
            }
        }

        // Momentum and spikes per region series.
        let detector = TrendDetector::new(
            self.config.policy.trend_window,
            self.config.policy.spike_z_threshold,
        );
        for batch in &report.batches {
            for (region, series) in &batch.series {
                let trend = detector.detect(series);
                let id = tracker.register(SignalDraft {
                    source_id: batch.source_id,
                    region: Some(region.clone()),
                    metric: Metric::Momentum,
                    value: trend.momentum,
                    unit: "slope".to_string(),
                    collected_at: Utc::now(),
                    status: SignalStatus::Ok,
                });
                stats.signals_registered += 1;
                if trend.is_spike {
                    stats.spikes_detected += 1;
                    let mut support = vec![id];
                    support.extend(tracker.ids_for(Metric::SearchInterest, Some(region)));
                    if let Err(e) = tracker.attach(
                        format!("Interest spike detected in {region}"),
                        &support,
                    ) {
                        warn!(region = region.as_str(), error = %e, "Dropped spike claim");
                    }
                }
            }
        }

        // Anticipation claim from the catalog prior.
        if let Some(popularity) = tracker.value_for(Metric::CatalogPopularity, None) {
            let mut support = tracker.ids_for(Metric::CatalogPopularity, None);
            support.extend(tracker.ids_for(Metric::FanbaseSize, None));
            if let Err(e) = tracker.attach(
                format!("Catalog anticipation index {popularity:.2}"),
                &support,
            ) {
                warn!(error = %e, "Dropped catalog claim");
            }
        }
    }

    /// Build each region's available-metric map from the tracked signal set
    /// and score it. Regions with nothing present are excluded, not zeroed.
    fn score_regions(&self, tracker: &SourceTracker, stats: &mut RunStats) -> Vec<RegionScore> {
        let scorer = RegionalScorer::new(self.config.policy.clone());
        let mut scores = Vec::new();

        for region in &self.config.regions {
            let mut available: BTreeMap<Metric, f64> = BTreeMap::new();
            let mut support: Vec<Uuid> = Vec::new();

            for metric in REGIONAL_METRICS {
                if let Some(value) = tracker.value_for(metric, Some(region)) {
                    available.insert(metric, unit_interval(metric, value));
                    support.extend(tracker.ids_for(metric, Some(region)));
                }
            }
            for metric in GLOBAL_METRICS {
                if let Some(value) = tracker.value_for(metric, None) {
                    available.insert(metric, unit_interval(metric, value));
                    support.extend(tracker.ids_for(metric, None));
                }
            }

            match scorer.score(region, &available, support) {
                Some(score) => {
                    stats.regions_scored += 1;
                    scores.push(score);
                }
                None => stats.regions_excluded += 1,
            }
        }

        scorer.rank(scores)
    }

    fn failed_campaign(
        &self,
        source_statuses: BTreeMap<SourceId, SourceStatus>,
        reason: FailureReason,
    ) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            signals: Vec::new(),
            claims: Vec::new(),
            region_scores: Vec::new(),
            phases: Vec::new(),
            source_statuses,
            pipeline_status: PipelineStatus::Failed { reason },
        }
    }

    fn emit(&self, stage: Stage) {
        info!(stage = %stage, "Stage transition");
        // No subscribers is fine; progress is strictly optional.
        let _ = self.progress.send(StageEvent {
            stage,
            at: Utc::now(),
        });
    }
}

/// Map a tracked metric value onto [0, 1] for scoring. Polarity-style
/// metrics live on [-1, 1] and are shifted; everything else is clamped.
fn unit_interval(metric: Metric, value: f64) -> f64 {
    match metric {
        Metric::SentimentScore | Metric::Momentum => ((value + 1.0) / 2.0).clamp(0.0, 1.0),
        _ => value.clamp(0.0, 1.0),
    }
}

/// Run one campaign pipeline to completion with the given configuration.
pub async fn run_pipeline(config: PipelineConfig) -> Result<Campaign, ReelSignalError> {
    Pipeline::new(config)?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::new("dQw4w9WgXcQ", "Example Film");
        config.metadata_api_key = Some("k1".to_string());
        config.engagement_api_key = Some("k2".to_string());
        config
    }

    #[test]
    fn malformed_video_reference_fails_validation() {
        let mut c = config();
        c.video_ref = "not a video".to_string();
        assert!(matches!(
            Pipeline::new(c),
            Err(ReelSignalError::Validation(_))
        ));
    }

    #[test]
    fn missing_required_credential_fails_validation() {
        let mut c = config();
        c.metadata_api_key = None;
        assert!(matches!(
            Pipeline::new(c),
            Err(ReelSignalError::MissingCredential(SourceId::Metadata))
        ));
    }

    #[test]
    fn optional_sources_toggle_on_credentials() {
        let mut c = config();
        c.trends_api_key = None;
        c.pageviews_enabled = false;
        let pipeline = Pipeline::new(c).unwrap();
        assert_eq!(pipeline.sources.len(), 2);

        let mut c = config();
        c.trends_api_key = Some("k3".to_string());
        let pipeline = Pipeline::new(c).unwrap();
        assert_eq!(pipeline.sources.len(), 4);
    }

    #[test]
    fn polarity_metrics_shift_to_unit_interval() {
        assert_eq!(unit_interval(Metric::SentimentScore, -1.0), 0.0);
        assert_eq!(unit_interval(Metric::SentimentScore, 1.0), 1.0);
        assert_eq!(unit_interval(Metric::Momentum, 0.0), 0.5);
        assert_eq!(unit_interval(Metric::SearchInterest, 1.4), 1.0);
    }
}
