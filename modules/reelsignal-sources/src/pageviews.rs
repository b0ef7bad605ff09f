//! Encyclopedia pageview source (Wikimedia REST style). OPTIONAL and
//! keyless. Regions map to language editions, so several regions can share
//! one underlying series; the cache collapses the duplicate fetches.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use reelsignal_common::types::{Metric, SignalStatus, SourceId};

use crate::error::{Result, SourceError};
use crate::source::{FetchContext, SignalDraft, SignalSource, SourceBatch, TrendPoint};

const BASE_URL: &str = "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article";

/// Days of history to pull per article.
const HISTORY_DAYS: i64 = 30;

/// log10 of daily views that maps to a 1.0 index (1M views/day).
const LOG_VIEW_CEILING: f64 = 6.0;

/// Language edition serving a given region.
fn project_for_region(region: &str) -> &'static str {
    match region {
        "DE" | "AT" | "CH" => "de.wikipedia.org",
        "FR" => "fr.wikipedia.org",
        "BR" | "PT" => "pt.wikipedia.org",
        "MX" | "ES" | "AR" => "es.wikipedia.org",
        "JP" => "ja.wikipedia.org",
        "IT" => "it.wikipedia.org",
        "KR" => "ko.wikipedia.org",
        _ => "en.wikipedia.org",
    }
}

pub struct PageviewSource {
    article: String,
}

impl PageviewSource {
    pub fn new(title: impl Into<String>) -> Self {
        let title: String = title.into();
        Self {
            article: title.trim().replace(' ', "_"),
        }
    }

    async fn project_series(&self, ctx: &FetchContext, project: &str) -> Result<Vec<TrendPoint>> {
        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(HISTORY_DAYS);
        let cache_key = format!("pageviews:{project}:{}", self.article);
        let body = match ctx.cache.get(&cache_key).await {
            Some(hit) => hit,
            None => {
                let url = format!(
                    "{BASE_URL}/{project}/all-access/user/{}/daily/{}/{}",
                    self.article,
                    start.format("%Y%m%d"),
                    end.format("%Y%m%d"),
                );
                let resp = ctx.http.get(url).send().await?;
                let status = resp.status();
                match status.as_u16() {
                    429 => return Err(SourceError::RateLimited),
                    // Article missing in this edition, so no data rather than an error.
                    404 => {
                        ctx.cache.put(cache_key, serde_json::json!({"items": []})).await;
                        return Ok(Vec::new());
                    }
                    s if !status.is_success() => return Err(SourceError::Http(s)),
                    _ => {}
                }
                let body: serde_json::Value = resp.json().await?;
                ctx.cache.put(cache_key, body.clone()).await;
                body
            }
        };

        let parsed: PageviewResponse =
            serde_json::from_value(body).map_err(|e| SourceError::Decode(e.to_string()))?;
        let mut points: Vec<TrendPoint> = parsed
            .items
            .into_iter()
            .filter_map(|item| {
                // Timestamps arrive as YYYYMMDDHH.
                let date = NaiveDate::parse_from_str(item.timestamp.get(..8)?, "%Y%m%d").ok()?;
                let at = DateTime::<Utc>::from_naive_utc_and_offset(
                    date.and_hms_opt(0, 0, 0)?,
                    Utc,
                );
                Some(TrendPoint {
                    at,
                    value: item.views as f64,
                })
            })
            .collect();
        points.sort_by_key(|p| p.at);
        Ok(points)
    }
}

#[async_trait]
impl SignalSource for PageviewSource {
    fn id(&self) -> SourceId {
        SourceId::Pageviews
    }

    fn is_required(&self) -> bool {
        false
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<SourceBatch> {
        let now = Utc::now();
        let mut batch = SourceBatch::new(SourceId::Pageviews);

        for region in &ctx.regions {
            let project = project_for_region(region);
            let points = self.project_series(ctx, project).await?;
            if points.is_empty() {
                batch.drafts.push(SignalDraft {
                    source_id: SourceId::Pageviews,
                    region: Some(region.clone()),
                    metric: Metric::PageviewIndex,
                    value: 0.0,
                    unit: "index".to_string(),
                    collected_at: now,
                    status: SignalStatus::Missing,
                });
                continue;
            }

            let daily_mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
            let index = ((daily_mean + 1.0).log10() / LOG_VIEW_CEILING).clamp(0.0, 1.0);
            batch.drafts.push(SignalDraft {
                source_id: SourceId::Pageviews,
                region: Some(region.clone()),
                metric: Metric::PageviewIndex,
                value: index,
                unit: "index".to_string(),
                collected_at: now,
                status: SignalStatus::Ok,
            });
            batch.series.insert(region.clone(), points);
        }

        info!(
            article = self.article.as_str(),
            regions_with_data = batch.series.len(),
            "Pageview series fetched"
        );
        Ok(batch)
    }
}

#[derive(Debug, Deserialize)]
struct PageviewResponse {
    #[serde(default)]
    items: Vec<PageviewItem>,
}

#[derive(Debug, Deserialize)]
struct PageviewItem {
    timestamp: String,
    views: u64,
}
