//! Benchmarks for schema index search latency.
//!
//! Measures stage-one search across index backends and sizes, and the cost
//! of embedding a question with the local hash embedder.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nl2sql_core::{DistanceMetric, IndexEntry, IndexQuery, SchemaIndex};
use nl2sql_embed::HashEmbedder;
use nl2sql_store::{MemoryIndex, SqliteIndex};
use std::sync::Arc;
use tempfile::tempdir;

const EMBEDDING_DIM: usize = 384;

/// Index entries for `count` synthetic tables.
fn create_entries(embedder: &HashEmbedder, count: usize) -> Vec<IndexEntry> {
    (0..count)
        .map(|i| {
            let table = format!("TABLE_{i}");
            let summary = format!("Facts about area {} and metric {} per day.", i % 37, i % 11);
            IndexEntry {
                embedding: embedder.embed_one(&format!("{table}\nSummary:\n{summary}")),
                table_chunk: format!("CREATE TABLE {table} (ID NUMBER, VALUE NUMBER)"),
                summary,
                table,
                embedding_model: Some("local-hash-v1".to_string()),
                indexed_at: Some(Utc::now()),
            }
        })
        .collect()
}

fn search_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let embedder = HashEmbedder::new(EMBEDDING_DIM);
    let query_embedding = embedder.embed_one("total metric 7 for area 3 per day");

    let mut group = c.benchmark_group("search");

    for table_count in &[100, 1_000] {
        let entries = create_entries(&embedder, *table_count);

        let memory = Arc::new(MemoryIndex::new());
        let temp_dir = tempdir().unwrap();
        let sqlite = Arc::new(SqliteIndex::open(temp_dir.path().join("bench.db")).unwrap());
        rt.block_on(async {
            memory.upsert(&entries).await.unwrap();
            sqlite.init().await.unwrap();
            for batch in entries.chunks(100) {
                sqlite.upsert(batch).await.unwrap();
            }
        });

        let backends: [(&str, Arc<dyn SchemaIndex>); 2] = [("memory", memory), ("sqlite", sqlite)];
        for (name, index) in backends {
            group.bench_with_input(
                BenchmarkId::new(name, format!("{table_count}_tables")),
                table_count,
                |b, _| {
                    b.to_async(&rt).iter(|| async {
                        let query = IndexQuery {
                            embedding: query_embedding.clone(),
                            limit: 6,
                            metric: DistanceMetric::Cosine,
                        };
                        black_box(index.search(query).await)
                    });
                },
            );
        }
    }

    group.finish();
}

fn embed_benchmark(c: &mut Criterion) {
    let embedder = HashEmbedder::new(EMBEDDING_DIM);
    c.bench_function("hash_embed_question", |b| {
        b.iter(|| black_box(embedder.embed_one("top 5 customers by revenue in the last quarter")));
    });
}

criterion_group!(benches, search_benchmark, embed_benchmark);
criterion_main!(benches);
