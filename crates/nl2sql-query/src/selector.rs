//! Two-stage restricted schema retrieval.

use std::sync::Arc;

use nl2sql_core::{
    DistanceMetric, Embedder, Error, IndexHit, IndexQuery, ModelRole, RestrictedSchema,
    SchemaIndex, TableChunk,
};
use nl2sql_llm::{prompts, ModelRoster};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::rerank::{parse_rerank_output, Pick};

/// Selection cardinalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Candidates kept by the similarity search
    pub top_k: usize,
    /// Tables kept by the reranker (never more than `top_k`)
    pub top_n: usize,
    /// Whether the reranking stage runs at all
    pub enable_reranking: bool,
    /// Similarity metric for stage one
    pub metric: DistanceMetric,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            top_n: 6,
            enable_reranking: true,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Picks the tables relevant to a question.
pub struct SchemaSelector {
    index: Arc<dyn SchemaIndex>,
    embedder: Arc<dyn Embedder>,
    roster: ModelRoster,
    config: SelectorConfig,
}

impl SchemaSelector {
    /// Create a selector. `top_n` is clamped to `top_k`.
    pub fn new(
        index: Arc<dyn SchemaIndex>,
        embedder: Arc<dyn Embedder>,
        roster: ModelRoster,
        mut config: SelectorConfig,
    ) -> Self {
        config.top_n = config.top_n.min(config.top_k);
        Self {
            index,
            embedder,
            roster,
            config,
        }
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// The restricted schema for `query`.
    ///
    /// Never fails: any error is logged and yields an empty schema, which
    /// callers read as "no candidate tables found".
    pub async fn select_schema(&self, query: &str) -> RestrictedSchema {
        match self.try_select(query).await {
            Ok(schema) => {
                info!("Restricted schema: {:?}", schema.table_names());
                schema
            }
            Err(e) => {
                error!("Schema selection failed: {}", e);
                RestrictedSchema::empty()
            }
        }
    }

    async fn try_select(&self, query: &str) -> Result<RestrictedSchema, Error> {
        let candidates = self.similar_tables(query).await?;
        debug!(
            "Stage one: {:?}",
            candidates.iter().map(|c| c.table.as_str()).collect::<Vec<_>>()
        );

        if !self.config.enable_reranking || candidates.is_empty() {
            return Ok(RestrictedSchema::new(candidates));
        }

        let reranked = self.rerank(query, &candidates).await?;
        Ok(RestrictedSchema::new(reranked))
    }

    /// Stage one: the `top_k` nearest tables, best first.
    pub async fn similar_tables(&self, query: &str) -> Result<Vec<TableChunk>, Error> {
        let embedding = self.embedder.embed_query(query).await?;
        let hits = self
            .index
            .search(IndexQuery {
                embedding: embedding.embedding,
                limit: self.config.top_k,
                metric: self.config.metric,
            })
            .await?;
        Ok(hits.into_iter().map(IndexHit::into_chunk).collect())
    }

    /// Stage two: ask the reranking model and resolve its picks.
    async fn rerank(&self, query: &str, candidates: &[TableChunk]) -> Result<Vec<TableChunk>, Error> {
        let model = self.roster.for_role(ModelRole::Reranking)?;
        let prompt = prompts::rerank_prompt(candidates, query, self.config.top_n);
        let raw = model.generate(&prompt).await?;
        debug!("Reranker output: {}", raw);
        Ok(resolve_picks(&parse_rerank_output(&raw), candidates, self.config.top_n))
    }
}

/// Map picks back to the candidates they name.
///
/// Unknown names and out-of-range positions are dropped, repeats are kept
/// once, and at most `limit` chunks are returned in pick order.
fn resolve_picks(picks: &[Pick], candidates: &[TableChunk], limit: usize) -> Vec<TableChunk> {
    let mut selected: Vec<TableChunk> = Vec::new();
    for pick in picks {
        if selected.len() >= limit {
            break;
        }
        let found = match pick {
            Pick::Table(id) => candidates.iter().find(|c| &c.table == id),
            Pick::Document(n) => n.checked_sub(1).and_then(|i| candidates.get(i)),
        };
        match found {
            Some(chunk) if !selected.iter().any(|s| s.table == chunk.table) => {
                selected.push(chunk.clone());
            }
            Some(_) => {}
            None => debug!("Dropping unresolved rerank pick {:?}", pick),
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use nl2sql_core::{EmbedError, EmbeddingOutput, IndexEntry, IndexError, IndexStats};
    use nl2sql_embed::HashEmbedder;
    use nl2sql_llm::ScriptedGenerator;
    use nl2sql_store::MemoryIndex;

    fn chunk(name: &str) -> TableChunk {
        TableChunk::new(name, format!("CREATE TABLE {name} (id INT)"))
    }

    async fn seeded_index(embedder: &HashEmbedder, tables: &[(&str, &str)]) -> Arc<MemoryIndex> {
        let index = Arc::new(MemoryIndex::new());
        let entries: Vec<IndexEntry> = tables
            .iter()
            .map(|(name, summary)| IndexEntry {
                table: (*name).to_string(),
                embedding: embedder.embed_one(&format!("{name}\nSummary:\n{summary}")),
                table_chunk: format!("CREATE TABLE {name} (id INT)"),
                summary: (*summary).to_string(),
                embedding_model: None,
                indexed_at: Some(Utc::now()),
            })
            .collect();
        index.upsert(&entries).await.unwrap();
        index
    }

    fn config(top_k: usize, top_n: usize, enable_reranking: bool) -> SelectorConfig {
        SelectorConfig {
            top_k,
            top_n,
            enable_reranking,
            metric: DistanceMetric::Cosine,
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            8
        }

        async fn embed_text(&self, _texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
            Err(EmbedError::Request("connection refused".to_string()))
        }
    }

    struct EmptyIndex;

    #[async_trait]
    impl SchemaIndex for EmptyIndex {
        async fn init(&self) -> Result<(), IndexError> {
            Ok(())
        }
        async fn upsert(&self, _entries: &[IndexEntry]) -> Result<(), IndexError> {
            Ok(())
        }
        async fn delete(&self, _table: &str) -> Result<u64, IndexError> {
            Ok(0)
        }
        async fn clear(&self) -> Result<u64, IndexError> {
            Ok(0)
        }
        async fn search(&self, _query: IndexQuery) -> Result<Vec<IndexHit>, IndexError> {
            Ok(Vec::new())
        }
        async fn tables(&self) -> Result<Vec<String>, IndexError> {
            Ok(Vec::new())
        }
        async fn stats(&self) -> Result<IndexStats, IndexError> {
            Ok(IndexStats::default())
        }
    }

    #[test]
    fn test_resolve_drops_unknown_tables() {
        let candidates = vec![chunk("A"), chunk("B"), chunk("C")];
        let picks = vec![Pick::Table("B".to_string()), Pick::Table("Z".to_string())];
        let resolved = resolve_picks(&picks, &candidates, 6);
        assert_eq!(resolved, vec![chunk("B")]);
    }

    #[test]
    fn test_resolve_documents_dedup_and_limit() {
        let candidates = vec![chunk("A"), chunk("B"), chunk("C")];
        let picks = vec![
            Pick::Document(3),
            Pick::Table("C".to_string()),
            Pick::Document(0),
            Pick::Document(9),
            Pick::Document(1),
            Pick::Table("B".to_string()),
        ];
        let resolved = resolve_picks(&picks, &candidates, 2);
        let names: Vec<_> = resolved.iter().map(|c| c.table.as_str()).collect();
        assert_eq!(names, vec!["C", "A"]);
    }

    #[tokio::test]
    async fn test_rerank_keeps_model_order() {
        let embedder = HashEmbedder::new(128);
        let index = seeded_index(
            &embedder,
            &[
                ("SALES", "sales amount per channel"),
                ("TIMES", "calendar days and months"),
                ("CHANNELS", "sales channel names"),
            ],
        )
        .await;
        let reranker = Arc::new(ScriptedGenerator::new("rerank", ["```\n[\"TIMES\", \"sales\"]\n```"]));
        let selector = SchemaSelector::new(
            index,
            Arc::new(embedder),
            ModelRoster::single(reranker.clone()),
            config(3, 2, true),
        );

        let schema = selector.select_schema("sales amount per month").await;
        assert_eq!(schema.table_names(), vec!["TIMES", "SALES"]);
        assert_eq!(reranker.calls(), 1);
        assert!(reranker.prompts()[0][0].content.contains("at most 2 tables"));
    }

    #[tokio::test]
    async fn test_rerank_drops_tables_outside_stage_one() {
        let embedder = HashEmbedder::new(128);
        let index = seeded_index(
            &embedder,
            &[("A", "alpha"), ("B", "beta"), ("C", "gamma")],
        )
        .await;
        let reranker = ScriptedGenerator::new("rerank", ["```[\"B\", \"Z\"]```"]);
        let selector = SchemaSelector::new(
            index,
            Arc::new(embedder),
            ModelRoster::single(Arc::new(reranker)),
            config(3, 3, true),
        );

        let schema = selector.select_schema("beta").await;
        assert_eq!(schema.table_names(), vec!["B"]);
        assert_eq!(schema.text(), "CREATE TABLE B (id INT)");
    }

    #[tokio::test]
    async fn test_without_reranking_uses_similarity_order() {
        let embedder = HashEmbedder::new(256);
        let index = seeded_index(
            &embedder,
            &[
                ("SALES", "sales amount per product and channel"),
                ("EMPLOYEES", "employee hire date and salary"),
            ],
        )
        .await;
        let reranker = Arc::new(ScriptedGenerator::new("rerank", ["[\"EMPLOYEES\"]"]));
        let selector = SchemaSelector::new(
            index,
            Arc::new(embedder),
            ModelRoster::single(reranker.clone()),
            config(1, 1, false),
        );

        let schema = selector.select_schema("total sales amount per channel").await;
        assert_eq!(schema.table_names(), vec!["SALES"]);
        assert_eq!(reranker.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_stage_one_skips_reranker() {
        let reranker = Arc::new(ScriptedGenerator::new("rerank", ["[\"X\"]"]));
        let selector = SchemaSelector::new(
            Arc::new(EmptyIndex),
            Arc::new(HashEmbedder::new(16)),
            ModelRoster::single(reranker.clone()),
            SelectorConfig::default(),
        );

        assert!(selector.select_schema("anything").await.is_empty());
        assert_eq!(reranker.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_empty_schema() {
        let selector = SchemaSelector::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(FailingEmbedder),
            ModelRoster::single(Arc::new(ScriptedGenerator::new("r", ["[]"]))),
            SelectorConfig::default(),
        );
        assert!(selector.select_schema("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_reranker_failure_yields_empty_schema() {
        let embedder = HashEmbedder::new(64);
        let index = seeded_index(&embedder, &[("A", "alpha")]).await;
        let selector = SchemaSelector::new(
            index,
            Arc::new(embedder),
            ModelRoster::single(Arc::new(ScriptedGenerator::failing("rerank"))),
            SelectorConfig::default(),
        );
        assert!(selector.select_schema("alpha").await.is_empty());
    }

    #[test]
    fn test_top_n_clamped_to_top_k() {
        let selector = SchemaSelector::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(HashEmbedder::new(8)),
            ModelRoster::single(Arc::new(ScriptedGenerator::new("r", ["[]"]))),
            config(3, 10, true),
        );
        assert_eq!(selector.config().top_n, 3);
    }
}
