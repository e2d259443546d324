//! Integration tests for the full nl2sql pipeline.
//!
//! Tests the complete flow: extract → summarize → embed → index → select →
//! route → generate → validate → cache → conversation.

use async_trait::async_trait;
use nl2sql_agent::{
    Assistant, ConversationError, DataAnalyzer, GeneratorOptions, MemoryConversationStore,
    MemoryRequestCache, QueryGenerator, Request, Router, SqlOutcome, SqliteDatabase, Status,
};
use nl2sql_core::{
    EmbedError, Embedder, EmbeddingOutput, RouteLabel, SchemaIndex, TextGenerator,
};
use nl2sql_embed::HashEmbedder;
use nl2sql_index::{MemorySampleSource, SchemaIndexer, TableFilter};
use nl2sql_llm::{prompts, ModelRoster, RoleBindings, ScriptedGenerator};
use nl2sql_query::{SchemaSelector, SelectorConfig};
use nl2sql_store::{MemoryIndex, SqliteIndex};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const TEST_DIM: usize = 256;

/// Mock embedder for testing: deterministic, content-addressed vectors.
struct MockEmbedder {
    dimension: usize,
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| {
                let hash = blake3::hash(text.as_bytes());
                let bytes = hash.as_bytes();
                let embedding: Vec<f32> = (0..self.dimension)
                    .map(|i| (f32::from(bytes[i % 32]) / 255.0) - 0.5)
                    .collect();
                EmbeddingOutput {
                    embedding,
                    token_count: text.split_whitespace().count(),
                }
            })
            .collect())
    }
}

/// Create the target database with a small star schema.
fn create_warehouse(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, user_group_id TEXT);
         CREATE TABLE sales (id INTEGER PRIMARY KEY, cust_id INTEGER, time_id INTEGER, amount REAL);
         CREATE TABLE times (id INTEGER PRIMARY KEY, day TEXT, month TEXT);
         CREATE TABLE hr_employees (id INTEGER PRIMARY KEY, name TEXT, salary REAL);
         INSERT INTO customers VALUES (1, 'Acme', 'G1'), (2, 'Globex', 'G2');
         INSERT INTO times VALUES (1, '2024-01-01', '2024-01'), (2, '2024-02-01', '2024-02');
         INSERT INTO sales VALUES (1, 1, 1, 10.0), (2, 1, 2, 5.0), (3, 2, 1, 7.5);
         INSERT INTO hr_employees VALUES (1, 'Ann', 1000.0);",
    )
    .unwrap();
}

/// Roster layout used throughout: one model per role, generation chain last.
struct Models {
    router: Arc<ScriptedGenerator>,
    summarizer: Arc<ScriptedGenerator>,
    reranker: Arc<ScriptedGenerator>,
    explainer: Arc<ScriptedGenerator>,
    generators: Vec<Arc<ScriptedGenerator>>,
}

impl Models {
    fn new(routes: &[RouteLabel], rerank: &str, generators: &[&str]) -> Self {
        let routes: Vec<String> = routes
            .iter()
            .map(|r| format!("```json\n{{\"classification\": \"{r}\"}}\n```"))
            .collect();
        Self {
            router: Arc::new(ScriptedGenerator::new("router", routes)),
            summarizer: Arc::new(ScriptedGenerator::new(
                "summarizer",
                [
                    "Customers of the company with their name and user group.",
                    "Employees of the HR department with salary.",
                    "Sales facts: amount sold per customer and day.",
                    "Calendar dimension with day and month.",
                ],
            )),
            reranker: Arc::new(ScriptedGenerator::new("reranker", [rerank])),
            explainer: Arc::new(ScriptedGenerator::new(
                "explainer",
                ["Acme bought the most, 15.0 in total."],
            )),
            generators: generators
                .iter()
                .enumerate()
                .map(|(i, reply)| Arc::new(ScriptedGenerator::new(format!("gen-{i}"), [*reply])))
                .collect(),
        }
    }

    fn roster(&self) -> ModelRoster {
        let mut models: Vec<Arc<dyn TextGenerator>> = vec![
            self.router.clone(),
            self.summarizer.clone(),
            self.reranker.clone(),
            self.explainer.clone(),
        ];
        models.extend(self.generators.iter().map(|g| g.clone() as Arc<dyn TextGenerator>));
        let bindings = RoleBindings {
            routing: 0,
            summary: 1,
            reranking: 2,
            explanation: 3,
            generation: (4..models.len()).collect(),
        };
        ModelRoster::new(models, bindings).unwrap()
    }
}

fn indexer(
    db: &Arc<SqliteDatabase>,
    models: &Models,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SchemaIndex>,
) -> SchemaIndexer {
    let samples = MemorySampleSource::new()
        .with_samples("sales", ["total sales per customer", "sales by month"]);
    SchemaIndexer::new(db.clone(), Arc::new(samples), models.roster(), embedder, index)
}

fn assistant(
    db: &Arc<SqliteDatabase>,
    models: &Models,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SchemaIndex>,
) -> Assistant {
    let roster = models.roster();
    Assistant::new(
        Router::new(roster.clone()),
        SchemaSelector::new(index, embedder, roster.clone(), SelectorConfig::default()),
        QueryGenerator::new(
            roster.clone(),
            db.clone(),
            GeneratorOptions {
                dialect: "SQLite".to_string(),
                ..GeneratorOptions::default()
            },
        ),
        DataAnalyzer::new(roster),
        Arc::new(MemoryRequestCache::new()),
        Arc::new(MemoryConversationStore::default()),
    )
    .with_runner(db.clone())
}

#[tokio::test]
async fn test_full_pipeline_rebuild_select_generate() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("warehouse.db");
    create_warehouse(&db_path);
    let db = Arc::new(SqliteDatabase::open(&db_path).unwrap());

    let models = Models::new(
        &[RouteLabel::GenerateSql],
        "```json\n[\"SALES\", \"CUSTOMERS\", \"ORDERS\"]\n```",
        &[
            "```sql\nSELECT nme FROM customers\n```",
            "```sql\nSELECT c.name, SUM(s.amount) AS total FROM sales s JOIN customers c ON c.id = s.cust_id GROUP BY c.name ORDER BY total DESC;\n```",
            "```sql\nSELECT 1\n```",
        ],
    );
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(TEST_DIM));
    let index: Arc<dyn SchemaIndex> =
        Arc::new(SqliteIndex::open(dir.path().join("index").join("index.db")).unwrap());

    // 1. Rebuild
    let report = indexer(&db, &models, embedder.clone(), index.clone())
        .rebuild(&TableFilter::All)
        .await
        .unwrap();
    assert_eq!(report.indexed.len(), 4);
    assert_eq!(index.stats().await.unwrap().total_tables, 4);

    // The summary prompt carried the sample queries of SALES.
    let summary_prompts = models.summarizer.prompts();
    assert!(summary_prompts
        .iter()
        .any(|p| p[0].content.contains("total sales per customer")));

    // 2. Select
    let assistant = assistant(&db, &models, embedder, index);
    let schema = assistant.selector().select_schema("total sales per customer").await;
    assert_eq!(schema.table_names(), vec!["SALES", "CUSTOMERS"]);
    assert!(schema.text().contains("3 rows from sales table:"));

    // 3. Generate: the first candidate fails validation, the second wins.
    let outcome = assistant.generate_sql("total sales per customer", None).await;
    let sql = outcome.sql().unwrap().to_string();
    assert!(matches!(outcome, SqlOutcome::Generated(_)));
    assert!(sql.starts_with("SELECT c.name, SUM(s.amount)"));
    assert!(!sql.ends_with(';'));
    assert_eq!(models.generators[0].calls(), 1);
    assert_eq!(models.generators[1].calls(), 1);
    assert_eq!(models.generators[2].calls(), 0);

    // 4. Cache
    let stats = assistant.cache().stats("total sales per customer").await.unwrap();
    assert_eq!(stats.sql, sql);
    assert_eq!(stats.success_count, 1);
    assert!(stats.average_generation_time.is_some());
}

#[tokio::test]
async fn test_rebuild_with_prefix_leaves_no_stale_entries() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("warehouse.db");
    create_warehouse(&db_path);
    let db = Arc::new(SqliteDatabase::open(&db_path).unwrap());

    let models = Models::new(&[RouteLabel::GenerateSql], "[]", &["SELECT 1"]);
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder { dimension: TEST_DIM });
    let index: Arc<dyn SchemaIndex> = Arc::new(MemoryIndex::new());
    let indexer = indexer(&db, &models, embedder.clone(), index.clone());

    indexer.rebuild(&TableFilter::All).await.unwrap();
    assert_eq!(index.tables().await.unwrap().len(), 4);

    let report = indexer.rebuild(&TableFilter::from_prefix("hr_")).await.unwrap();
    assert_eq!(report.indexed, vec!["HR_EMPLOYEES"]);
    assert_eq!(report.removed, 4);
    assert_eq!(index.tables().await.unwrap(), vec!["HR_EMPLOYEES"]);

    let selector = SchemaSelector::new(
        index,
        embedder,
        models.roster(),
        SelectorConfig {
            enable_reranking: false,
            ..SelectorConfig::default()
        },
    );
    let schema = selector.select_schema("total sales per customer").await;
    assert_eq!(schema.table_names(), vec!["HR_EMPLOYEES"]);
}

#[tokio::test]
async fn test_update_only_touches_listed_tables() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("warehouse.db");
    create_warehouse(&db_path);
    let db = Arc::new(SqliteDatabase::open(&db_path).unwrap());

    let models = Models::new(&[RouteLabel::GenerateSql], "[]", &["SELECT 1"]);
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder { dimension: TEST_DIM });
    let index: Arc<dyn SchemaIndex> = Arc::new(MemoryIndex::new());
    let indexer = indexer(&db, &models, embedder, index.clone());
    indexer.rebuild(&TableFilter::All).await.unwrap();
    let calls_after_rebuild = models.summarizer.calls();

    let report = indexer
        .update(&["sales".to_string(), "orders".to_string()])
        .await
        .unwrap();
    assert_eq!(report.indexed, vec!["SALES"]);
    assert_eq!(report.missing, vec!["ORDERS"]);
    assert_eq!(models.summarizer.calls(), calls_after_rebuild + 1);
    assert_eq!(index.tables().await.unwrap().len(), 4);

    // Re-running converges to the same entries.
    indexer.update(&["sales".to_string()]).await.unwrap();
    assert_eq!(index.tables().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_assistant_conversation_flow() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("warehouse.db");
    create_warehouse(&db_path);
    let db = Arc::new(SqliteDatabase::open(&db_path).unwrap());

    let models = Models::new(
        &[RouteLabel::GenerateSql, RouteLabel::AnalyzeData, RouteLabel::NotAllowed],
        "[\"SALES\", \"CUSTOMERS\"]",
        &["SELECT c.name, SUM(s.amount) AS total FROM sales s JOIN customers c ON c.id = s.cust_id GROUP BY c.name ORDER BY total DESC"],
    );
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(TEST_DIM));
    let index: Arc<dyn SchemaIndex> = Arc::new(MemoryIndex::new());
    indexer(&db, &models, embedder.clone(), index.clone())
        .rebuild(&TableFilter::All)
        .await
        .unwrap();
    let assistant = assistant(&db, &models, embedder, index);

    // generate_sql: rows come back and feed the conversation.
    let response = assistant
        .handle(&Request::new("revenue per customer", "conv-1"))
        .await;
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.kind, "data");
    assert_eq!(response.content[0]["name"], "Acme");
    assert_eq!(response.content[0]["total"], 15.0);

    // analyze_data: answered from the history.
    let response = assistant
        .handle(&Request::new("who bought the most?", "conv-1"))
        .await;
    assert_eq!(response.kind, "analysis");
    assert_eq!(response.content_text(), "Acme bought the most, 15.0 in total.");
    let sent = &models.explainer.prompts()[0];
    assert_eq!(sent[0].content, prompts::ANALYZER_PREAMBLE);
    assert!(sent[2].content.starts_with(prompts::DATA_MESSAGE_PREFIX));
    assert!(sent[2].content.contains("Acme"));

    // not_allowed: fixed answer, no generation.
    let response = assistant
        .handle(&Request::new("delete every customer", "conv-1"))
        .await;
    assert_eq!(response.kind, "not_allowed");
    assert_eq!(response.content_text(), prompts::NOT_ALLOWED_ANSWER);

    // Cache hit: classified without the router, SQL reused.
    let router_calls = models.router.calls();
    let response = assistant
        .handle(&Request::new("revenue per customer", "conv-2"))
        .await;
    assert_eq!(response.kind, "data");
    assert_eq!(models.router.calls(), router_calls);
    assert_eq!(models.generators[0].calls(), 1);

    let history = assistant.conversations().get("conv-1").await;
    assert_eq!(history.len(), 5);
    assert_eq!(assistant.conversations().get("conv-2").await.len(), 2);

    assistant.conversations().delete("conv-1").await.unwrap();
    assert!(assistant.conversations().get("conv-1").await.is_empty());
    assert_eq!(
        assistant.conversations().delete("conv-1").await,
        Err(ConversationError::NotFound("conv-1".to_string()))
    );
}

#[tokio::test]
async fn test_generation_exhaustion_reports_failure() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("warehouse.db");
    create_warehouse(&db_path);
    let db = Arc::new(SqliteDatabase::open(&db_path).unwrap());

    let models = Models::new(
        &[RouteLabel::GenerateSql],
        "[\"SALES\"]",
        &["DELETE FROM sales", "SELECT * FROM nowhere", "I cannot help with that"],
    );
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(TEST_DIM));
    let index: Arc<dyn SchemaIndex> = Arc::new(MemoryIndex::new());
    indexer(&db, &models, embedder.clone(), index.clone())
        .rebuild(&TableFilter::All)
        .await
        .unwrap();
    let assistant = assistant(&db, &models, embedder, index);

    let response = assistant.handle(&Request::new("sales by planet", "c")).await;
    assert_eq!(response.status, Status::Ko);
    assert_eq!(response.kind, "data");
    assert!(response.msg.starts_with("SQL not generated!"));
    for generator in &models.generators {
        assert_eq!(generator.calls(), 1);
    }

    let stats = assistant.cache().stats("sales by planet").await.unwrap();
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.sql, "");
    assert_eq!(assistant.cache().lookup("sales by planet").await, None);
}

#[tokio::test]
async fn test_empty_index_selects_nothing() {
    let models = Models::new(&[RouteLabel::GenerateSql], "[]", &["SELECT 1"]);
    let selector = SchemaSelector::new(
        Arc::new(MemoryIndex::new()),
        Arc::new(HashEmbedder::new(TEST_DIM)),
        models.roster(),
        SelectorConfig::default(),
    );
    assert!(selector.select_schema("anything").await.is_empty());
    assert_eq!(models.reranker.calls(), 0);
}
