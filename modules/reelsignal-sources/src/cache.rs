use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

/// TTL cache for raw provider responses, shared across sources within a run
/// and across runs when the caller keeps it alive. A hit skips the network
/// round-trip; it never changes what the pipeline computes, only how fast.
pub struct FetchCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    stored_at: Instant,
    value: serde_json::Value,
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        debug!(key, "fetch cache hit");
        Some(entry.value.clone())
    }

    pub async fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            CacheEntry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    /// Drop entries past their TTL. Callers may invoke this between runs;
    /// expired entries are also ignored on read.
    pub async fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.stored_at.elapsed() <= self.ttl);
        before - entries.len()
    }
}
