//! Search-interest source (SerpApi Google Trends style). OPTIONAL and the
//! most rate-limit-prone provider in the set: one request per region, each
//! yielding a 0-100 interest series the trend detector works over.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use reelsignal_common::types::{Metric, SignalStatus, SourceId};

use crate::error::{Result, SourceError};
use crate::source::{FetchContext, SignalDraft, SignalSource, SourceBatch, TrendPoint};

const BASE_URL: &str = "https://serpapi.com/search.json";

/// How many trailing points feed the interest draft.
const INTEREST_SAMPLE: usize = 7;

pub struct TrendSource {
    api_key: String,
    query: String,
}

impl TrendSource {
    pub fn new(api_key: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            query: query.into(),
        }
    }

    async fn region_series(&self, ctx: &FetchContext, region: &str) -> Result<Vec<TrendPoint>> {
        let cache_key = format!("trends:{}:{region}", self.query.to_lowercase());
        let body = match ctx.cache.get(&cache_key).await {
            Some(hit) => hit,
            None => {
                let resp = ctx
                    .http
                    .get(BASE_URL)
                    .query(&[
                        ("engine", "google_trends"),
                        ("data_type", "TIMESERIES"),
                        ("q", self.query.as_str()),
                        ("geo", region),
                        ("api_key", self.api_key.as_str()),
                    ])
                    .send()
                    .await?;
                let status = resp.status();
                if status.as_u16() == 429 {
                    return Err(SourceError::RateLimited);
                }
                if !status.is_success() {
                    return Err(SourceError::Http(status.as_u16()));
                }
                let body: serde_json::Value = resp.json().await?;
                ctx.cache.put(cache_key, body.clone()).await;
                body
            }
        };

        let parsed: TrendsResponse =
            serde_json::from_value(body).map_err(|e| SourceError::Decode(e.to_string()))?;
        let mut points: Vec<TrendPoint> = parsed
            .interest_over_time
            .timeline_data
            .into_iter()
            .filter_map(|entry| {
                let secs: i64 = entry.timestamp.parse().ok()?;
                let at = DateTime::<Utc>::from_timestamp(secs, 0)?;
                let value = entry.values.first().map(|v| v.extracted_value)?;
                Some(TrendPoint { at, value })
            })
            .collect();
        points.sort_by_key(|p| p.at);
        Ok(points)
    }
}

#[async_trait]
impl SignalSource for TrendSource {
    fn id(&self) -> SourceId {
        SourceId::SearchTrends
    }

    fn is_required(&self) -> bool {
        false
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<SourceBatch> {
        if self.api_key.is_empty() {
            return Err(SourceError::MissingCredential("trends api key"));
        }

        let now = Utc::now();
        let mut batch = SourceBatch::new(SourceId::SearchTrends);

        // Regions fetched sequentially on purpose: this provider rate-limits
        // aggressively, and the collector already runs sources in parallel.
        for region in &ctx.regions {
            let points = self.region_series(ctx, region).await?;
            if points.is_empty() {
                batch.drafts.push(SignalDraft {
                    source_id: SourceId::SearchTrends,
                    region: Some(region.clone()),
                    metric: Metric::SearchInterest,
                    value: 0.0,
                    unit: "index".to_string(),
                    collected_at: now,
                    status: SignalStatus::Missing,
                });
                continue;
            }

            let tail = &points[points.len().saturating_sub(INTEREST_SAMPLE)..];
            let interest = tail.iter().map(|p| p.value).sum::<f64>() / tail.len() as f64;
            batch.drafts.push(SignalDraft {
                source_id: SourceId::SearchTrends,
                region: Some(region.clone()),
                metric: Metric::SearchInterest,
                value: (interest / 100.0).clamp(0.0, 1.0),
                unit: "index".to_string(),
                collected_at: now,
                status: SignalStatus::Ok,
            });
            batch.series.insert(region.clone(), points);
        }

        info!(
            query = self.query.as_str(),
            regions = batch.series.len(),
            "Search-interest series fetched"
        );
        Ok(batch)
    }
}

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    #[serde(default)]
    interest_over_time: InterestOverTime,
}

#[derive(Debug, Deserialize, Default)]
struct InterestOverTime {
    #[serde(default)]
    timeline_data: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    timestamp: String,
    #[serde(default)]
    values: Vec<TimelineValue>,
}

#[derive(Debug, Deserialize)]
struct TimelineValue {
    #[serde(default)]
    extracted_value: f64,
}
