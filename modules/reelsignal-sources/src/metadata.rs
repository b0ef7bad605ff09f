//! Movie metadata catalog source (TMDB-style API). REQUIRED: without a
//! catalog entry there is nothing to anchor claims or the campaign to.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use reelsignal_common::types::{Metric, SignalStatus, SourceId};

use crate::error::{Result, SourceError};
use crate::source::{FetchContext, SignalDraft, SignalSource, SourceBatch};

const BASE_URL: &str = "https://api.themoviedb.org/3";

/// Popularity above this maps to a 1.0 catalog signal.
const POPULARITY_CEILING: f64 = 100.0;

/// Vote counts above this are treated as a fully-established fanbase.
const VOTE_COUNT_CEILING: f64 = 50_000.0;

pub struct MetadataSource {
    api_key: String,
    title: String,
}

impl MetadataSource {
    pub fn new(api_key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            title: title.into(),
        }
    }

    async fn search(&self, ctx: &FetchContext) -> Result<MovieEntry> {
        let cache_key = format!("metadata:search:{}", self.title.to_lowercase());
        let body = match ctx.cache.get(&cache_key).await {
            Some(hit) => hit,
            None => {
                let resp = ctx
                    .http
                    .get(format!("{BASE_URL}/search/movie"))
                    .query(&[("query", self.title.as_str()), ("api_key", &self.api_key)])
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

        let results: SearchResponse = serde_json::from_value(body)
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        results
            .results
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::InvalidReference(format!("no catalog entry for '{}'", self.title)))
    }
}

#[async_trait]
impl SignalSource for MetadataSource {
    fn id(&self) -> SourceId {
        SourceId::Metadata
    }

    fn is_required(&self) -> bool {
        true
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<SourceBatch> {
        if self.api_key.is_empty() {
            return Err(SourceError::MissingCredential("metadata api key"));
        }

        let entry = self.search(ctx).await?;
        info!(
            title = entry.title.as_str(),
            popularity = entry.popularity,
            votes = entry.vote_count,
            "Catalog entry resolved"
        );

        let now = Utc::now();
        let mut batch = SourceBatch::new(SourceId::Metadata);

        // Global anticipation prior. Degraded when the catalog has the film
        // but nobody has rated it yet.
        let status = if entry.vote_count == 0 {
            SignalStatus::Degraded
        } else {
            SignalStatus::Ok
        };
        batch.drafts.push(SignalDraft {
            source_id: SourceId::Metadata,
            region: None,
            metric: Metric::CatalogPopularity,
            value: (entry.popularity / POPULARITY_CEILING).clamp(0.0, 1.0),
            unit: "index".to_string(),
            collected_at: now,
            status,
        });
        batch.drafts.push(SignalDraft {
            source_id: SourceId::Metadata,
            region: None,
            metric: Metric::FanbaseSize,
            value: (entry.vote_count as f64 / VOTE_COUNT_CEILING).clamp(0.0, 1.0),
            unit: "index".to_string(),
            collected_at: now,
            status,
        });

        Ok(batch)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<MovieEntry>,
}

#[derive(Debug, Deserialize)]
struct MovieEntry {
    #[allow(dead_code)]
    id: u64,
    title: String,
    #[serde(default)]
    popularity: f64,
    #[serde(default)]
    vote_count: u64,
}
