//! SQLite-backed schema index.
//!
//! Entries live in a single `schema_index` table keyed by table id.
//! Embeddings are stored as little-endian `f32` blobs and scored in process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nl2sql_core::{
    normalize_table_id, IndexEntry, IndexError, IndexHit, IndexQuery, IndexStats, SchemaIndex,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::rank;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_index (
    table_id        TEXT PRIMARY KEY,
    summary         TEXT NOT NULL,
    table_chunk     TEXT NOT NULL,
    embedding       BLOB NOT NULL,
    dimension       INTEGER NOT NULL,
    embedding_model TEXT,
    indexed_at      TEXT NOT NULL
);
";

/// Persistent schema index stored in a SQLite file.
#[derive(Clone)]
pub struct SqliteIndex {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Open (or create) an index file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| IndexError::Init(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(|e| IndexError::Init(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| IndexError::Init(e.to_string()))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An index that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory().map_err(|e| IndexError::Init(e.to_string()))?;
        Ok(Self {
            path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Location of the index file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, IndexError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, IndexError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| IndexError::Query("index connection poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| IndexError::Query(e.to_string()))?
    }
}

fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8], dimension: usize) -> Option<Vec<f32>> {
    if blob.len() != dimension.saturating_mul(4) {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl SchemaIndex for SqliteIndex {
    async fn init(&self) -> Result<(), IndexError> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA_SQL)
                .map_err(|e| IndexError::Init(e.to_string()))
        })
        .await?;
        debug!("SqliteIndex initialized at {:?}", self.path);
        Ok(())
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let entries = entries.to_vec();
        let count = entries.len();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| IndexError::Insert(e.to_string()))?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR REPLACE INTO schema_index
                         (table_id, summary, table_chunk, embedding, dimension, embedding_model, indexed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )
                    .map_err(|e| IndexError::Insert(e.to_string()))?;
                for entry in &entries {
                    let indexed_at = entry.indexed_at.unwrap_or_else(Utc::now).to_rfc3339();
                    stmt.execute(params![
                        normalize_table_id(&entry.table),
                        entry.summary,
                        entry.table_chunk,
                        encode_embedding(&entry.embedding),
                        entry.embedding.len() as i64,
                        entry.embedding_model,
                        indexed_at,
                    ])
                    .map_err(|e| IndexError::Insert(e.to_string()))?;
                }
            }
            tx.commit().map_err(|e| IndexError::Insert(e.to_string()))
        })
        .await?;
        debug!("Upserted {} index entries", count);
        Ok(())
    }

    async fn delete(&self, table: &str) -> Result<u64, IndexError> {
        let table = normalize_table_id(table);
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM schema_index WHERE table_id = ?1", params![table])
                .map(|n| n as u64)
                .map_err(|e| IndexError::Delete(e.to_string()))
        })
        .await
    }

    async fn clear(&self) -> Result<u64, IndexError> {
        let removed = self
            .with_conn(|conn| {
                conn.execute("DELETE FROM schema_index", [])
                    .map(|n| n as u64)
                    .map_err(|e| IndexError::Delete(e.to_string()))
            })
            .await?;
        debug!("Cleared {} index entries", removed);
        Ok(removed)
    }

    async fn search(&self, query: IndexQuery) -> Result<Vec<IndexHit>, IndexError> {
        let rows = self
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT table_id, table_chunk, embedding, dimension FROM schema_index")
                    .map_err(|e| IndexError::Query(e.to_string()))?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    })
                    .map_err(|e| IndexError::Query(e.to_string()))?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| IndexError::Query(e.to_string()))
            })
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for (table, table_chunk, blob, dimension) in rows {
            let Some(embedding) = decode_embedding(&blob, dimension.max(0) as usize) else {
                warn!("Skipping {}: corrupt embedding blob", table);
                continue;
            };
            hits.push(IndexHit {
                score: query.metric.score(&query.embedding, &embedding),
                table,
                table_chunk,
            });
        }
        Ok(rank(hits, &query))
    }

    async fn tables(&self) -> Result<Vec<String>, IndexError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT table_id FROM schema_index ORDER BY table_id")
                .map_err(|e| IndexError::Query(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| IndexError::Query(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| IndexError::Query(e.to_string()))
        })
        .await
    }

    async fn stats(&self) -> Result<IndexStats, IndexError> {
        self.with_conn(|conn| {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM schema_index", [], |row| row.get(0))
                .map_err(|e| IndexError::Query(e.to_string()))?;
            let last: Option<String> = conn
                .query_row("SELECT MAX(indexed_at) FROM schema_index", [], |row| row.get(0))
                .optional()
                .map_err(|e| IndexError::Query(e.to_string()))?
                .flatten();
            Ok(IndexStats {
                total_tables: total.max(0) as u64,
                last_updated: last.as_deref().and_then(parse_timestamp),
            })
        })
        .await
    }
}
