use std::env;
use std::time::Duration;

use crate::policy::ScoringPolicy;

/// Default target regions when the caller does not supply a list.
pub const DEFAULT_REGIONS: [&str; 10] = [
    "US", "GB", "CA", "AU", "DE", "FR", "BR", "IN", "JP", "MX",
];

/// Immutable configuration for one pipeline run. Built explicitly by the
/// caller and passed into `run_pipeline`; there is no process-wide mutable
/// state for credentials or caches.
///
/// Credential presence toggles a source on: a missing OPTIONAL credential
/// simply disables that source, a missing REQUIRED credential fails
/// validation before collection starts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Trailer video reference, either a full watch URL or a bare video id.
    pub video_ref: String,
    /// Movie title used for metadata and trend lookups.
    pub title: String,
    /// ISO country codes to score and plan against.
    pub regions: Vec<String>,

    // Credentials. Metadata and engagement are REQUIRED sources; search
    // trends is OPTIONAL. The pageview index is keyless and toggled directly.
    pub metadata_api_key: Option<String>,
    pub engagement_api_key: Option<String>,
    pub trends_api_key: Option<String>,
    pub pageviews_enabled: bool,

    /// Budget for a single fetch attempt against one source.
    pub per_source_timeout: Duration,
    /// Hard ceiling on the whole collection stage.
    pub overall_deadline: Duration,
    /// TTL for the shared fetch cache.
    pub cache_ttl: Duration,

    pub policy: ScoringPolicy,
}

impl PipelineConfig {
    pub fn new(video_ref: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            video_ref: video_ref.into(),
            title: title.into(),
            regions: DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
            metadata_api_key: None,
            engagement_api_key: None,
            trends_api_key: None,
            pageviews_enabled: true,
            per_source_timeout: Duration::from_secs(15),
            overall_deadline: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(15 * 60),
            policy: ScoringPolicy::default(),
        }
    }

    /// Load configuration from environment variables. Panics with a clear
    /// message if required vars are missing; this is the binary boundary,
    /// library callers construct the config directly.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            required_env("REELSIGNAL_VIDEO"),
            required_env("REELSIGNAL_TITLE"),
        );
        if let Ok(regions) = env::var("REELSIGNAL_REGIONS") {
            config.regions = regions
                .split(',')
                .map(|r| r.trim().to_uppercase())
                .filter(|r| !r.is_empty())
                .collect();
        }
        config.metadata_api_key = env::var("TMDB_API_KEY").ok();
        config.engagement_api_key = env::var("YOUTUBE_API_KEY").ok();
        config.trends_api_key = env::var("TRENDS_API_KEY").ok();
        if let Ok(v) = env::var("PAGEVIEWS_ENABLED") {
            config.pageviews_enabled = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Ok(secs) = env::var("REELSIGNAL_SOURCE_TIMEOUT_SECS") {
            config.per_source_timeout =
                Duration::from_secs(secs.parse().expect("REELSIGNAL_SOURCE_TIMEOUT_SECS must be a number"));
        }
        if let Ok(secs) = env::var("REELSIGNAL_DEADLINE_SECS") {
            config.overall_deadline =
                Duration::from_secs(secs.parse().expect("REELSIGNAL_DEADLINE_SECS must be a number"));
        }
        config
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
