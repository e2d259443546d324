//! # nl2sql-store
//!
//! Storage backends for the schema index: one entry per table holding the
//! embedding of its summary and the raw table definition.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqliteIndex`] | Persistent single-file index (default) |
//! | [`MemoryIndex`] | In-process index for tests and throwaway runs |
//!
//! Both score entries by brute force; a schema has at most a few thousand
//! tables, so an ANN structure would not pay for itself.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use nl2sql_core::{IndexHit, IndexQuery};

/// Sort scored hits best-first and keep the top `query.limit`.
///
/// Ties are broken by table id so results are deterministic.
pub(crate) fn rank(mut hits: Vec<IndexHit>, query: &IndexQuery) -> Vec<IndexHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.table.cmp(&b.table))
    });
    hits.truncate(query.limit);
    hits
}
