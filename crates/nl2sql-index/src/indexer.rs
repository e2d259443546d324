//! Schema index maintenance: full rebuild and selective update.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use nl2sql_core::{
    normalize_table_id, Embedder, Error, IndexEntry, ModelRole, Result, SampleSource,
    SchemaIndex, SchemaSource, TableChunk,
};
use nl2sql_llm::{prompts, ModelRoster};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::ddl::split_ddl;
use crate::filter::TableFilter;

/// Outcome of a rebuild or update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    /// Tables written to the index
    pub indexed: Vec<String>,
    /// Tables skipped because summarizing or embedding them failed
    pub skipped: Vec<String>,
    /// Requested tables not present in the schema
    pub missing: Vec<String>,
    /// Entries removed before reinsertion
    pub removed: u64,
}

/// Builds index entries from the database schema.
pub struct SchemaIndexer {
    source: Arc<dyn SchemaSource>,
    samples: Arc<dyn SampleSource>,
    roster: ModelRoster,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SchemaIndex>,
}

impl SchemaIndexer {
    pub fn new(
        source: Arc<dyn SchemaSource>,
        samples: Arc<dyn SampleSource>,
        roster: ModelRoster,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SchemaIndex>,
    ) -> Self {
        Self {
            source,
            samples,
            roster,
            embedder,
            index,
        }
    }

    /// Extract the schema and split it into table chunks.
    pub async fn chunks(&self) -> Result<Vec<TableChunk>> {
        let raw = self.source.raw_schema().await.map_err(|e| {
            error!("Schema extraction failed: {}", e);
            Error::from(e)
        })?;
        let chunks = split_ddl(&raw);
        info!("Schema has {} tables", chunks.len());
        Ok(chunks)
    }

    /// Drop the whole index and reinsert every table passing `filter`.
    ///
    /// Entries are built before the index is cleared, so a failing schema
    /// source leaves the previous index in place.
    pub async fn rebuild(&self, filter: &TableFilter) -> Result<IndexReport> {
        self.index.init().await?;
        let chunks: Vec<TableChunk> = self
            .chunks()
            .await?
            .into_iter()
            .filter(|c| filter.matches(&c.table))
            .collect();
        info!("Rebuilding index for {} tables", chunks.len());

        let mut report = IndexReport::default();
        let entries = self.build_entries(&chunks, &mut report).await?;

        report.removed = self.index.clear().await.map_err(|e| {
            error!("Clearing index failed: {}", e);
            Error::from(e)
        })?;
        self.write(&entries).await?;
        info!(
            "Index rebuilt: {} indexed, {} skipped",
            report.indexed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Delete then reinsert only the listed tables.
    ///
    /// Entries for other tables are not touched. A listed table that no
    /// longer exists in the schema is removed from the index.
    pub async fn update(&self, tables: &[String]) -> Result<IndexReport> {
        self.index.init().await?;
        let wanted: HashSet<String> = tables.iter().map(|t| normalize_table_id(t)).collect();
        let chunks: Vec<TableChunk> = self
            .chunks()
            .await?
            .into_iter()
            .filter(|c| wanted.contains(&c.table))
            .collect();

        let mut report = IndexReport::default();
        let found: HashSet<&str> = chunks.iter().map(|c| c.table.as_str()).collect();
        let mut missing: Vec<String> = wanted
            .iter()
            .filter(|t| !found.contains(t.as_str()))
            .cloned()
            .collect();
        missing.sort();
        for table in &missing {
            warn!(table = %table, "Table not found in schema");
        }
        report.missing = missing;

        let entries = self.build_entries(&chunks, &mut report).await?;

        let mut targets: Vec<&String> = wanted.iter().collect();
        targets.sort();
        for table in targets {
            report.removed += self.index.delete(table).await.map_err(|e| {
                error!(table = %table, "Deleting index entry failed: {}", e);
                Error::from(e)
            })?;
        }
        self.write(&entries).await?;
        info!(
            "Index updated: {} indexed, {} skipped, {} missing",
            report.indexed.len(),
            report.skipped.len(),
            report.missing.len()
        );
        Ok(report)
    }

    async fn write(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.index.upsert(entries).await.map_err(|e| {
            error!("Writing index entries failed: {}", e);
            Error::from(e)
        })
    }

    async fn build_entries(
        &self,
        chunks: &[TableChunk],
        report: &mut IndexReport,
    ) -> Result<Vec<IndexEntry>> {
        let model = self.roster.for_role(ModelRole::Summary)?;
        let mut entries = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let samples = match self.samples.samples(&chunk.table).await {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(table = %chunk.table, "Sample queries unavailable: {}", e);
                    Vec::new()
                }
            };

            let summary = match model
                .generate(&prompts::summary_prompt(&chunk.ddl, &samples))
                .await
            {
                Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
                Ok(_) => {
                    error!(table = %chunk.table, "Empty summary, skipping table");
                    report.skipped.push(chunk.table.clone());
                    continue;
                }
                Err(e) => {
                    error!(table = %chunk.table, "Summary generation failed: {}", e);
                    report.skipped.push(chunk.table.clone());
                    continue;
                }
            };
            debug!(table = %chunk.table, "Summary: {}", summary);

            let document = prompts::summary_document(&chunk.table, &summary);
            let embedding = match self.embedder.embed_text(&[document.as_str()]).await {
                Ok(mut outputs) if !outputs.is_empty() => outputs.swap_remove(0).embedding,
                Ok(_) => {
                    error!(table = %chunk.table, "Embedder returned nothing, skipping table");
                    report.skipped.push(chunk.table.clone());
                    continue;
                }
                Err(e) => {
                    error!(table = %chunk.table, "Embedding failed: {}", e);
                    report.skipped.push(chunk.table.clone());
                    continue;
                }
            };

            report.indexed.push(chunk.table.clone());
            entries.push(IndexEntry {
                table: chunk.table.clone(),
                embedding,
                table_chunk: chunk.ddl.clone(),
                summary,
                embedding_model: Some(self.embedder.model_name().to_string()),
                indexed_at: Some(Utc::now()),
            });
        }
        Ok(entries)
    }
}
