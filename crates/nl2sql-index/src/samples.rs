//! Example questions per table, used to ground table summaries.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use nl2sql_core::{normalize_table_id, SampleError, SampleSource};
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct SampleRecord {
    table: Option<String>,
    #[serde(default)]
    sample_queries: Vec<String>,
}

/// Sample questions held in memory, keyed by uppercase table id.
#[derive(Debug, Clone, Default)]
pub struct MemorySampleSource {
    samples: HashMap<String, Vec<String>>,
}

impl MemorySampleSource {
    /// An empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add questions for a table.
    #[must_use]
    pub fn with_samples<I, S>(mut self, table: &str, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.samples
            .entry(normalize_table_id(table))
            .or_default()
            .extend(queries.into_iter().map(Into::into));
        self
    }

    /// Number of tables with samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no table has samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait]
impl SampleSource for MemorySampleSource {
    async fn samples(&self, table: &str) -> Result<Vec<String>, SampleError> {
        Ok(self
            .samples
            .get(&normalize_table_id(table))
            .cloned()
            .unwrap_or_default())
    }
}

/// Sample questions loaded from a JSON file.
///
/// The file is an array of `{"table": "...", "sample_queries": ["..."]}`
/// records. Table names are normalized to uppercase.
#[derive(Debug, Clone, Default)]
pub struct JsonSampleSource {
    inner: MemorySampleSource,
}

impl JsonSampleSource {
    /// Parse a JSON document.
    pub fn parse(json: &str) -> Result<Self, SampleError> {
        let records: Vec<SampleRecord> =
            serde_json::from_str(json).map_err(|e| SampleError::Parse(e.to_string()))?;
        let mut inner = MemorySampleSource::new();
        for record in records {
            if let Some(table) = record.table.filter(|t| !t.trim().is_empty()) {
                inner = inner.with_samples(&table, record.sample_queries);
            }
        }
        Ok(Self { inner })
    }

    /// Load a file.
    pub fn load(path: &Path) -> Result<Self, SampleError> {
        let json = std::fs::read_to_string(path)?;
        let source = Self::parse(&json)?;
        info!("Loaded sample queries for {} tables from {:?}", source.inner.len(), path);
        Ok(source)
    }

    /// Load a file, falling back to no samples if it is missing or invalid.
    #[must_use]
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            error!("Error reading sample queries from {:?}: {}", path, e);
            Self::default()
        })
    }
}

#[async_trait]
impl SampleSource for JsonSampleSource {
    async fn samples(&self, table: &str) -> Result<Vec<String>, SampleError> {
        self.inner.samples(table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLES: &str = r#"[
        {"table": "sales", "sample_queries": ["total sales by year", "top products"]},
        {"table": "Times", "sample_queries": []},
        {"sample_queries": ["orphan"]}
    ]"#;

    #[tokio::test]
    async fn test_parse_normalizes_tables() {
        let source = JsonSampleSource::parse(SAMPLES).unwrap();
        assert_eq!(source.samples("SALES").await.unwrap().len(), 2);
        assert!(source.samples("times").await.unwrap().is_empty());
        assert!(source.samples("unknown").await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = JsonSampleSource::parse(r#"{"table": "x"}"#).unwrap_err();
        assert!(matches!(err, SampleError::Parse(_)));
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLES.as_bytes()).unwrap();

        let source = JsonSampleSource::load(file.path()).unwrap();
        assert_eq!(
            source.samples("sales").await.unwrap(),
            vec!["total sales by year", "top products"]
        );
    }

    #[tokio::test]
    async fn test_load_or_empty_missing_file() {
        let source = JsonSampleSource::load_or_empty(Path::new("/nonexistent/samples.json"));
        assert!(source.samples("sales").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_source_merges() {
        let source = MemorySampleSource::new()
            .with_samples("a", ["q1"])
            .with_samples("A", ["q2"]);
        assert_eq!(source.len(), 1);
        assert_eq!(source.samples("a").await.unwrap(), vec!["q1", "q2"]);
    }
}
