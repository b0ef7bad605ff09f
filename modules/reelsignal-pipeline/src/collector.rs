//! Concurrent, failure-tolerant source collection.
//!
//! Every configured source is dispatched at once. Each runs inside its own
//! bounded retry loop with a per-attempt timeout; the whole set is polled
//! under one overall deadline. When the deadline elapses the stream is
//! dropped. That is cooperative cancellation: in-flight attempts are abandoned,
//! never merged, and unfinished sources are reported as timed out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use reelsignal_common::types::{SourceId, SourceOutcome, SourceStatus};
use reelsignal_sources::{FetchContext, SignalSource, SourceBatch, SourceError};

#[derive(Debug, Default)]
pub struct CollectReport {
    pub batches: Vec<SourceBatch>,
    pub statuses: BTreeMap<SourceId, SourceStatus>,
    pub cancelled: bool,
}

impl CollectReport {
    /// The first REQUIRED source whose data is absent: retry budget
    /// exhausted, or still outstanding when the deadline fired. Either way
    /// the run cannot stand without it.
    pub fn hard_failure(&self, sources: &[Arc<dyn SignalSource>]) -> Option<SourceId> {
        for source in sources {
            if let Some(status) = self.statuses.get(&source.id()) {
                let absent = matches!(
                    status.outcome,
                    SourceOutcome::FailedHard | SourceOutcome::TimedOut
                );
                if source.is_required() && absent {
                    return Some(source.id());
                }
            }
        }
        None
    }
}

struct SourceResult {
    source_id: SourceId,
    required: bool,
    attempts: u32,
    result: Result<SourceBatch, SourceError>,
}

/// Run all sources concurrently and return whatever completed before the
/// deadline, with a per-source status map. Never returns an error: source
/// failures are absorbed into statuses here and resolved by the caller.
pub async fn collect(
    sources: &[Arc<dyn SignalSource>],
    ctx: &FetchContext,
    per_source_timeout: Duration,
    overall_deadline: Duration,
    mut cancel: Option<watch::Receiver<bool>>,
) -> CollectReport {
    let deadline = Instant::now() + overall_deadline;
    let mut report = CollectReport::default();

    let futs = sources.iter().map(|source| {
        let source = Arc::clone(source);
        let ctx = ctx.clone();
        async move { fetch_with_retry(source, ctx, per_source_timeout).await }
    });
    let mut in_flight = stream::iter(futs).buffer_unordered(sources.len().max(1));

    loop {
        let next = if let Some(rx) = cancel.as_mut() {
            tokio::select! {
                changed = rx.changed() => {
                    match changed {
                        Ok(()) => {
                            if *rx.borrow() {
                                report.cancelled = true;
                                break;
                            }
                            // A false notification is not a cancellation;
                            // keep watching for a real one.
                            continue;
                        }
                        // Sender dropped: no cancellation can arrive anymore.
                        Err(_) => {
                            cancel = None;
                            continue;
                        }
                    }
                }
                next = tokio::time::timeout_at(deadline, in_flight.next()) => next,
            }
        } else {
            tokio::time::timeout_at(deadline, in_flight.next()).await
        };

        match next {
            Ok(Some(done)) => record(&mut report, done),
            Ok(None) => break,
            Err(_) => {
                warn!("Collection deadline elapsed, abandoning outstanding sources");
                break;
            }
        }
    }
    drop(in_flight);

    // Anything without a status was still in flight at the deadline (or at
    // cancellation). Excluded from the result set, never merged late.
    for source in sources {
        report.statuses.entry(source.id()).or_insert(SourceStatus {
            outcome: SourceOutcome::TimedOut,
            attempts: 0,
            detail: Some(if report.cancelled {
                "cancelled before completion".to_string()
            } else {
                "outstanding at overall deadline".to_string()
            }),
        });
    }

    report
}

fn record(report: &mut CollectReport, done: SourceResult) {
    match done.result {
        Ok(batch) => {
            info!(source = %done.source_id, attempts = done.attempts, "Source succeeded");
            report.statuses.insert(
                done.source_id,
                SourceStatus {
                    outcome: SourceOutcome::Succeeded,
                    attempts: done.attempts,
                    detail: None,
                },
            );
            report.batches.push(batch);
        }
        Err(e) => {
            let outcome = if done.required {
                SourceOutcome::FailedHard
            } else {
                SourceOutcome::FailedSoft
            };
            warn!(source = %done.source_id, attempts = done.attempts, outcome = %outcome, error = %e, "Source failed");
            report.statuses.insert(
                done.source_id,
                SourceStatus {
                    outcome,
                    attempts: done.attempts,
                    detail: Some(e.to_string()),
                },
            );
        }
    }
}

/// One source's bounded retry loop. Transient failures (timeouts, 5xx,
/// explicit rate limits) back off and retry within the source's budget;
/// anything else fails immediately.
async fn fetch_with_retry(
    source: Arc<dyn SignalSource>,
    ctx: FetchContext,
    per_source_timeout: Duration,
) -> SourceResult {
    let policy = source.retry_policy();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let attempt = tokio::time::timeout(per_source_timeout, source.fetch(&ctx)).await;
        let result = match attempt {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout),
        };

        match result {
            Ok(batch) => {
                return SourceResult {
                    source_id: source.id(),
                    required: source.is_required(),
                    attempts,
                    result: Ok(batch),
                }
            }
            Err(e) if e.is_transient() && attempts < policy.max_attempts => {
                let backoff = policy.backoff(attempts);
                warn!(
                    source = %source.id(),
                    attempt = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Transient source failure, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                return SourceResult {
                    source_id: source.id(),
                    required: source.is_required(),
                    attempts,
                    result: Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakySource, NeverSource, StaticSource};
    use reelsignal_sources::FetchCache;

    fn ctx() -> FetchContext {
        FetchContext::new(
            Arc::new(FetchCache::new(Duration::from_secs(60))),
            vec!["US".to_string(), "GB".to_string()],
        )
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[tokio::test]
    async fn all_sources_succeed() {
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(StaticSource::required(SourceId::Metadata)),
            Arc::new(StaticSource::optional(SourceId::Pageviews)),
        ];
        let report = collect(&sources, &ctx(), secs(5), secs(10), None).await;
        assert_eq!(report.batches.len(), 2);
        assert!(report.hard_failure(&sources).is_none());
        for status in report.statuses.values() {
            assert_eq!(status.outcome, SourceOutcome::Succeeded);
            assert_eq!(status.attempts, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_reports_three_attempts() {
        let flaky = Arc::new(FlakySource::new(SourceId::SearchTrends, false, 2));
        let sources: Vec<Arc<dyn SignalSource>> = vec![flaky.clone()];
        let report = collect(&sources, &ctx(), secs(5), secs(120), None).await;

        let status = &report.statuses[&SourceId::SearchTrends];
        assert_eq!(status.outcome, SourceOutcome::Succeeded);
        assert_eq!(status.attempts, 3);
        assert_eq!(flaky.calls(), 3);
        assert_eq!(report.batches.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn optional_source_exhausting_budget_fails_soft() {
        let flaky = Arc::new(FlakySource::new(SourceId::SearchTrends, false, 99));
        let sources: Vec<Arc<dyn SignalSource>> = vec![flaky.clone()];
        let report = collect(&sources, &ctx(), secs(5), secs(120), None).await;

        let status = &report.statuses[&SourceId::SearchTrends];
        assert_eq!(status.outcome, SourceOutcome::FailedSoft);
        assert_eq!(status.attempts, 3);
        assert!(report.hard_failure(&sources).is_none());
        assert!(report.batches.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn required_source_exhausting_budget_fails_hard() {
        let flaky = Arc::new(FlakySource::new(SourceId::Metadata, true, 99));
        let sources: Vec<Arc<dyn SignalSource>> = vec![flaky.clone()];
        let report = collect(&sources, &ctx(), secs(5), secs(120), None).await;

        assert_eq!(
            report.statuses[&SourceId::Metadata].outcome,
            SourceOutcome::FailedHard
        );
        assert_eq!(report.hard_failure(&sources), Some(SourceId::Metadata));
    }

    #[tokio::test(start_paused = true)]
    async fn stragglers_are_timed_out_at_deadline() {
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(StaticSource::required(SourceId::Metadata)),
            Arc::new(NeverSource::optional(SourceId::Pageviews)),
        ];
        // Per-source timeout longer than the deadline, so the hang is cut by
        // the overall deadline rather than the retry loop.
        let report = collect(&sources, &ctx(), secs(300), secs(10), None).await;

        assert_eq!(
            report.statuses[&SourceId::Metadata].outcome,
            SourceOutcome::Succeeded
        );
        assert_eq!(
            report.statuses[&SourceId::Pageviews].outcome,
            SourceOutcome::TimedOut
        );
        assert_eq!(report.batches.len(), 1);
        assert!(report.hard_failure(&sources).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_shares_the_deadline_path() {
        let (tx, rx) = watch::channel(false);
        let sources: Vec<Arc<dyn SignalSource>> =
            vec![Arc::new(NeverSource::required(SourceId::Metadata))];

        let ctx = ctx();
        let collect_fut = collect(&sources, &ctx, secs(300), secs(600), Some(rx));
        let cancel_fut = async move {
            tokio::time::sleep(secs(1)).await;
            let _ = tx.send(true);
        };
        let (report, _) = tokio::join!(collect_fut, cancel_fut);

        assert!(report.cancelled);
        assert_eq!(
            report.statuses[&SourceId::Metadata].outcome,
            SourceOutcome::TimedOut
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_survives_a_false_notification() {
        let (tx, rx) = watch::channel(false);
        let sources: Vec<Arc<dyn SignalSource>> =
            vec![Arc::new(NeverSource::required(SourceId::Metadata))];

        let ctx = ctx();
        let collect_fut = collect(&sources, &ctx, secs(300), secs(600), Some(rx));
        let cancel_fut = async move {
            // A notification that still reads false must not eat the watch.
            tokio::time::sleep(secs(1)).await;
            let _ = tx.send(false);
            tokio::time::sleep(secs(1)).await;
            let _ = tx.send(true);
        };
        let (report, _) = tokio::join!(collect_fut, cancel_fut);

        assert!(report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn required_straggler_is_a_hard_failure_at_deadline() {
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(NeverSource::required(SourceId::Engagement)),
            Arc::new(StaticSource::optional(SourceId::Pageviews)),
        ];
        let report = collect(&sources, &ctx(), secs(300), secs(10), None).await;

        assert_eq!(
            report.statuses[&SourceId::Engagement].outcome,
            SourceOutcome::TimedOut
        );
        assert_eq!(report.hard_failure(&sources), Some(SourceId::Engagement));
    }
}
