//! Trailer engagement source (YouTube Data API style): video statistics plus
//! the comment threads the sentiment ensemble runs over. REQUIRED; the
//! trailer is the subject of the whole run.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use reelsignal_common::types::{Metric, SignalStatus, SourceId};

use crate::error::{Result, SourceError};
use crate::source::{FetchContext, SignalDraft, SignalSource, SourceBatch};

const BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Comment pages are capped; we only need a sentiment sample, not the firehose.
const COMMENT_SAMPLE_SIZE: u32 = 100;

/// Engagement rates above this count as fully saturated audience response.
const ENGAGEMENT_RATE_CEILING: f64 = 0.12;

/// Parse a trailer reference into a bare video id. Accepts full watch URLs
/// (`youtube.com/watch?v=..`), short links (`youtu.be/..`), and bare ids.
pub fn parse_video_ref(reference: &str) -> std::result::Result<String, String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err("empty video reference".to_string());
    }

    if let Ok(parsed) = url::Url::parse(trimmed) {
        let host = parsed.host_str().unwrap_or_default();
        if host.ends_with("youtube.com") {
            if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "v") {
                return validate_video_id(&id);
            }
            return Err(format!("no video id in URL: {trimmed}"));
        }
        if host == "youtu.be" {
            let id = parsed.path().trim_start_matches('/');
            return validate_video_id(id);
        }
        if !host.is_empty() {
            return Err(format!("unrecognized video host: {host}"));
        }
    }

    validate_video_id(trimmed)
}

fn validate_video_id(id: &str) -> std::result::Result<String, String> {
    let valid = id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id.to_string())
    } else {
        Err(format!("malformed video id: {id}"))
    }
}

pub struct EngagementSource {
    api_key: String,
    video_id: String,
}

impl EngagementSource {
    pub fn new(api_key: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            video_id: video_id.into(),
        }
    }

    async fn get_json(&self, ctx: &FetchContext, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let resp = ctx
            .http
            .get(format!("{BASE_URL}/{path}"))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        let status = resp.status();
        match status.as_u16() {
            429 => return Err(SourceError::RateLimited),
            // Quota exhaustion surfaces as 403 with a rate-limit reason.
            403 => {
                let body = resp.text().await.unwrap_or_default();
                if body.contains("quotaExceeded") || body.contains("rateLimitExceeded") {
                    return Err(SourceError::RateLimited);
                }
                return Err(SourceError::Http(403));
            }
            s if !status.is_success() => return Err(SourceError::Http(s)),
            _ => {}
        }
        Ok(resp.json().await?)
    }

    async fn statistics(&self, ctx: &FetchContext) -> Result<VideoStatistics> {
        let cache_key = format!("engagement:stats:{}", self.video_id);
        let body = match ctx.cache.get(&cache_key).await {
            Some(hit) => hit,
            None => {
                let body = self
                    .get_json(ctx, "videos", &[("part", "statistics"), ("id", &self.video_id)])
                    .await?;
                ctx.cache.put(cache_key, body.clone()).await;
                body
            }
        };
        let listing: VideoListing =
            serde_json::from_value(body).map_err(|e| SourceError::Decode(e.to_string()))?;
        listing
            .items
            .into_iter()
            .next()
            .map(|item| item.statistics)
            .ok_or_else(|| SourceError::InvalidReference(format!("video not found: {}", self.video_id)))
    }

    async fn comments(&self, ctx: &FetchContext) -> Result<Vec<String>> {
        let body = self
            .get_json(
                ctx,
                "commentThreads",
                &[
                    ("part", "snippet"),
                    ("videoId", &self.video_id),
                    ("maxResults", &COMMENT_SAMPLE_SIZE.to_string()),
                    ("order", "relevance"),
                ],
            )
            .await?;
        let listing: CommentListing =
            serde_json::from_value(body).map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(listing
            .items
            .into_iter()
            .map(|t| t.snippet.top_level_comment.snippet.text_display)
            .collect())
    }
}

#[async_trait]
impl SignalSource for EngagementSource {
    fn id(&self) -> SourceId {
        SourceId::Engagement
    }

    fn is_required(&self) -> bool {
        true
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<SourceBatch> {
        if self.api_key.is_empty() {
            return Err(SourceError::MissingCredential("engagement api key"));
        }

        let stats = self.statistics(ctx).await?;
        let views = stats.view_count();
        let reactions = stats.like_count() + stats.comment_count();
        let rate = if views > 0 {
            (reactions as f64 / views as f64 / ENGAGEMENT_RATE_CEILING).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Disabled or empty comment sections degrade the batch instead of
        // failing it; sentiment just goes missing for the run.
        let (comments, status) = match self.comments(ctx).await {
            Ok(comments) => (comments, SignalStatus::Ok),
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                warn!(video = self.video_id.as_str(), error = %e, "Comment fetch failed, continuing without sentiment sample");
                (Vec::new(), SignalStatus::Degraded)
            }
        };

        info!(
            video = self.video_id.as_str(),
            views,
            engagement_rate = rate,
            comments = comments.len(),
            "Engagement fetched"
        );

        let mut batch = SourceBatch::new(SourceId::Engagement);
        batch.drafts.push(SignalDraft {
            source_id: SourceId::Engagement,
            region: None,
            metric: Metric::EngagementRate,
            value: rate,
            unit: "ratio".to_string(),
            collected_at: Utc::now(),
            status,
        });
        batch.comments = comments;
        Ok(batch)
    }
}

#[derive(Debug, Deserialize)]
struct VideoListing {
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    statistics: VideoStatistics,
}

/// The API reports counters as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    #[serde(default)]
    view_count: String,
    #[serde(default)]
    like_count: String,
    #[serde(default)]
    comment_count: String,
}

impl VideoStatistics {
    fn view_count(&self) -> u64 {
        self.view_count.parse().unwrap_or(0)
    }
    fn like_count(&self) -> u64 {
        self.like_count.parse().unwrap_or(0)
    }
    fn comment_count(&self) -> u64 {
        self.comment_count.parse().unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct CommentListing {
    items: Vec<CommentThread>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    text_display: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_url() {
        let id = parse_video_ref("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_short_link() {
        let id = parse_video_ref("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_bare_id() {
        assert_eq!(parse_video_ref("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_video_ref("").is_err());
        assert!(parse_video_ref("not a video").is_err());
        assert!(parse_video_ref("https://vimeo.com/12345").is_err());
        assert!(parse_video_ref("https://www.youtube.com/playlist?list=PL123").is_err());
    }

    #[test]
    fn statistics_parse_string_counters() {
        let stats: VideoStatistics = serde_json::from_value(serde_json::json!({
            "viewCount": "1000000",
            "likeCount": "50000",
            "commentCount": "1200"
        }))
        .unwrap();
        assert_eq!(stats.view_count(), 1_000_000);
        assert_eq!(stats.like_count(), 50_000);
        assert_eq!(stats.comment_count(), 1_200);
    }
}
