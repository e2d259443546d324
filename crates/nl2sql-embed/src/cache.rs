//! Embedding cache keyed by content hash.
//!
//! Rebuilding the index re-embeds unchanged summaries, and repeated questions
//! re-embed the same query text. [`CachedEmbedder`] keeps results keyed by
//! the blake3 hash of the text and evicts the least recently used tenth of
//! the entries once full.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nl2sql_core::{EmbedError, Embedder, EmbeddingOutput};
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum number of entries in the cache.
const DEFAULT_CACHE_SIZE: usize = 10_000;

#[derive(Clone)]
struct CacheEntry {
    output: EmbeddingOutput,
    last_access: u64,
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries evicted
    pub evictions: u64,
}

/// An [`Embedder`] that memoizes another one.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: RwLock<HashMap<blake3::Hash, CacheEntry>>,
    max_size: usize,
    clock: AtomicU64,
    stats: RwLock<CacheStats>,
}

impl CachedEmbedder {
    /// Wrap an embedder with the default capacity.
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_SIZE)
    }

    /// Wrap an embedder with a specific capacity.
    pub fn with_capacity(inner: Arc<dyn Embedder>, max_size: usize) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
            clock: AtomicU64::new(0),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Number of cached embeddings.
    pub async fn size(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Drop every cached embedding.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    /// Evict the oldest entries so `incoming` more fit.
    async fn make_room(&self, incoming: usize) {
        let mut cache = self.cache.write().await;
        if cache.len() + incoming <= self.max_size {
            return;
        }

        let evict_count = (cache.len() + incoming - self.max_size).max(self.max_size / 10);
        let mut entries: Vec<_> = cache.iter().map(|(k, v)| (*k, v.last_access)).collect();
        entries.sort_by_key(|(_, access)| *access);

        let mut stats = self.stats.write().await;
        for (key, _) in entries.into_iter().take(evict_count) {
            cache.remove(&key);
            stats.evictions += 1;
        }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        let mut results: Vec<Option<EmbeddingOutput>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<&str> = Vec::new();
        let mut missing_idx: Vec<usize> = Vec::new();

        {
            let mut cache = self.cache.write().await;
            let mut stats = self.stats.write().await;
            for (i, text) in texts.iter().enumerate() {
                let key = blake3::hash(text.as_bytes());
                if let Some(entry) = cache.get_mut(&key) {
                    stats.hits += 1;
                    entry.last_access = self.tick();
                    results.push(Some(entry.output.clone()));
                } else {
                    stats.misses += 1;
                    missing.push(*text);
                    missing_idx.push(i);
                    results.push(None);
                }
            }
        }

        if !missing.is_empty() {
            debug!("Embedding cache miss for {} texts", missing.len());
            let fresh = self.inner.embed_text(&missing).await?;
            if fresh.len() != missing.len() {
                return Err(EmbedError::Inference(format!(
                    "expected {} embeddings, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }

            self.make_room(missing.len()).await;
            let mut cache = self.cache.write().await;
            for ((text, idx), output) in missing.iter().zip(missing_idx).zip(fresh) {
                cache.insert(
                    blake3::hash(text.as_bytes()),
                    CacheEntry {
                        output: output.clone(),
                        last_access: self.tick(),
                    },
                );
                results[idx] = Some(output);
            }
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| EmbedError::Inference("missing embedding".to_string())))
            .collect()
    }
}
