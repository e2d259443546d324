//! Exact-match cache of generated SQL.
//!
//! Each distinct request keeps its last good statement plus attempt
//! counters. A failed attempt bumps the counters but never replaces a
//! statement that was already cached.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Per-request statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Cached statement, empty if none succeeded yet
    pub sql: String,
    pub total_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Mean generation time in seconds, rounded to two decimals
    pub average_generation_time: Option<f64>,
}

/// Storage for request → SQL mappings.
#[async_trait]
pub trait RequestCache: Send + Sync {
    /// Cached, non-empty, unexpired SQL for `request`.
    async fn lookup(&self, request: &str) -> Option<String>;

    /// Record one generation attempt.
    ///
    /// `success` alone decides which counter moves. `sql` is stored only
    /// when `success` is true and it is non-empty.
    async fn record(&self, request: &str, sql: &str, success: bool, generation_time: Duration);

    /// Statistics for one request, `None` if it was never recorded.
    async fn stats(&self, request: &str) -> Option<CacheStats>;

    /// Statistics for every recorded request.
    async fn all_stats(&self) -> HashMap<String, CacheStats>;

    /// Forget the cached SQL for `request`, keeping its counters.
    ///
    /// Returns whether a statement was dropped.
    async fn invalidate(&self, request: &str) -> bool;

    /// Drop every entry and counter.
    async fn clear(&self);
}

#[derive(Debug, Default)]
struct Entry {
    sql: String,
    stored_at: Option<Instant>,
    total_count: u64,
    success_count: u64,
    failure_count: u64,
    total_time: Duration,
}

impl Entry {
    fn stats(&self) -> CacheStats {
        let average_generation_time = (self.total_count > 0).then(|| {
            let mean = self.total_time.as_secs_f64() / self.total_count as f64;
            (mean * 100.0).round() / 100.0
        });
        CacheStats {
            sql: self.sql.clone(),
            total_count: self.total_count,
            success_count: self.success_count,
            failure_count: self.failure_count,
            average_generation_time,
        }
    }
}

fn cache_key(request: &str) -> &str {
    request.trim()
}

/// In-process [`RequestCache`].
#[derive(Debug, Default)]
pub struct MemoryRequestCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryRequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached statements older than `ttl` stop being served.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn expired(&self, stored_at: Option<Instant>) -> bool {
        match (self.ttl, stored_at) {
            (Some(ttl), Some(at)) => at.elapsed() >= ttl,
            _ => false,
        }
    }
}

#[async_trait]
impl RequestCache for MemoryRequestCache {
    async fn lookup(&self, request: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(cache_key(request))?;
        if entry.sql.is_empty() {
            return None;
        }
        if self.expired(entry.stored_at) {
            debug!("Cached SQL expired for {:?}", request);
            return None;
        }
        Some(entry.sql.clone())
    }

    async fn record(&self, request: &str, sql: &str, success: bool, generation_time: Duration) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(cache_key(request).to_string()).or_default();

        entry.total_count += 1;
        entry.total_time += generation_time;
        if success {
            entry.success_count += 1;
            if !sql.is_empty() {
                entry.sql = sql.to_string();
                entry.stored_at = Some(Instant::now());
            }
        } else {
            entry.failure_count += 1;
        }
    }

    async fn stats(&self, request: &str) -> Option<CacheStats> {
        self.entries
            .read()
            .await
            .get(cache_key(request))
            .map(Entry::stats)
    }

    async fn all_stats(&self) -> HashMap<String, CacheStats> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(k, e)| (k.clone(), e.stats()))
            .collect()
    }

    async fn invalidate(&self, request: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(cache_key(request)) {
            Some(entry) if !entry.sql.is_empty() => {
                entry.sql.clear();
                entry.stored_at = None;
                true
            }
            _ => false,
        }
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
