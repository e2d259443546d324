//! In-memory schema index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nl2sql_core::{
    normalize_table_id, IndexEntry, IndexError, IndexHit, IndexQuery, IndexStats, SchemaIndex,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::rank;

/// In-memory schema index.
///
/// Keeps all entries in a map keyed by table id and searches by brute
/// force. Nothing survives the process.
///
/// # Example
///
/// ```rust
/// use nl2sql_store::MemoryIndex;
/// use nl2sql_core::SchemaIndex;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let index = MemoryIndex::new();
/// index.init().await?;
/// assert_eq!(index.stats().await?.total_tables, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryIndex {
    entries: Arc<RwLock<HashMap<String, IndexEntry>>>,
    last_updated: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl MemoryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemaIndex for MemoryIndex {
    async fn init(&self) -> Result<(), IndexError> {
        debug!("MemoryIndex initialized");
        Ok(())
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let mut store = self.entries.write().await;
        for entry in entries {
            let mut entry = entry.clone();
            entry.table = normalize_table_id(&entry.table);
            store.insert(entry.table.clone(), entry);
        }
        *self.last_updated.write().await = Some(Utc::now());
        debug!("Upserted {} index entries", entries.len());
        Ok(())
    }

    async fn delete(&self, table: &str) -> Result<u64, IndexError> {
        let removed = self
            .entries
            .write()
            .await
            .remove(&normalize_table_id(table))
            .is_some();
        Ok(u64::from(removed))
    }

    async fn clear(&self) -> Result<u64, IndexError> {
        let mut store = self.entries.write().await;
        let removed = store.len() as u64;
        store.clear();
        debug!("Cleared {} index entries", removed);
        Ok(removed)
    }

    async fn search(&self, query: IndexQuery) -> Result<Vec<IndexHit>, IndexError> {
        let store = self.entries.read().await;
        let hits = store
            .values()
            .map(|entry| IndexHit {
                table: entry.table.clone(),
                table_chunk: entry.table_chunk.clone(),
                score: query.metric.score(&query.embedding, &entry.embedding),
            })
            .collect();
        Ok(rank(hits, &query))
    }

    async fn tables(&self) -> Result<Vec<String>, IndexError> {
        let mut tables: Vec<String> = self.entries.read().await.keys().cloned().collect();
        tables.sort();
        Ok(tables)
    }

    async fn stats(&self) -> Result<IndexStats, IndexError> {
        Ok(IndexStats {
            total_tables: self.entries.read().await.len() as u64,
            last_updated: *self.last_updated.read().await,
        })
    }
}
