//! Core types for nl2sql.
//!
//! ## Schema
//! - [`TableChunk`]: One table's raw definition
//! - [`RestrictedSchema`]: The ordered subset of chunks selected for a request
//!
//! ## Index
//! - [`IndexEntry`]: Stored summary embedding plus its table chunk
//! - [`IndexQuery`]: Parameters for a similarity search
//! - [`IndexHit`]: A match returned by the index
//! - [`DistanceMetric`]: Vector distance calculation method
//!
//! ## Models and routing
//! - [`ModelRole`]: The job a roster model is bound to
//! - [`RouteLabel`]: Request classification labels
//! - [`ChatMessage`]: One message of a conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Schema
// ============================================================================

/// Normalize a table identifier to its canonical uppercase form.
///
/// Surrounding whitespace, quotes and backticks are dropped.
#[must_use]
pub fn normalize_table_id(name: &str) -> String {
    name.trim()
        .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        .to_uppercase()
}

/// One table's raw definition (columns, types, constraints, optional sample rows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChunk {
    /// Canonical uppercase table identifier
    pub table: String,
    /// The `CREATE TABLE` statement, plus any trailing comments
    pub ddl: String,
}

impl TableChunk {
    /// Create a chunk, normalizing the table name.
    pub fn new(table: &str, ddl: impl Into<String>) -> Self {
        Self {
            table: normalize_table_id(table),
            ddl: ddl.into(),
        }
    }
}

/// The subset of a schema selected for one request.
///
/// Request-scoped and never persisted. An empty schema means no candidate
/// tables were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictedSchema {
    tables: Vec<TableChunk>,
}

impl RestrictedSchema {
    /// Build from chunks in their selection order.
    #[must_use]
    pub fn new(tables: Vec<TableChunk>) -> Self {
        Self { tables }
    }

    /// An empty schema.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Selected chunks, in order.
    #[must_use]
    pub fn tables(&self) -> &[TableChunk] {
        &self.tables
    }

    /// Selected table identifiers, in order.
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.table.as_str()).collect()
    }

    /// Whether no tables were selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of selected tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether any selected chunk mentions `column` (case-insensitive).
    #[must_use]
    pub fn advertises_column(&self, column: &str) -> bool {
        let needle = column.to_uppercase();
        self.tables
            .iter()
            .any(|t| t.ddl.to_uppercase().contains(&needle))
    }

    /// The concatenated schema text handed to the models.
    #[must_use]
    pub fn text(&self) -> String {
        self.tables
            .iter()
            .map(|t| t.ddl.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for RestrictedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

// ============================================================================
// Index
// ============================================================================

/// An entry of the schema index: one per table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Canonical uppercase table identifier
    pub table: String,
    /// Embedding of the summary document
    pub embedding: Vec<f32>,
    /// Raw table definition returned on a match
    pub table_chunk: String,
    /// Natural-language summary that was embedded
    pub summary: String,
    /// Embedding model used
    pub embedding_model: Option<String>,
    /// When the entry was written
    pub indexed_at: Option<DateTime<Utc>>,
}

/// Vector distance metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Euclidean distance, reported as `1 / (1 + d)`
    L2,
    /// Raw dot product
    Dot,
}

impl DistanceMetric {
    /// Similarity score between two vectors; higher is closer.
    #[must_use]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        match self {
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot / (norm_a * norm_b)
            }
            Self::L2 => {
                let dist: f32 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
            Self::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        }
    }
}

/// Similarity search parameters.
#[derive(Debug, Clone)]
pub struct IndexQuery {
    /// Query embedding
    pub embedding: Vec<f32>,
    /// Maximum number of hits
    pub limit: usize,
    /// Distance metric
    pub metric: DistanceMetric,
}

/// A similarity-search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    /// Canonical uppercase table identifier
    pub table: String,
    /// Raw table definition
    pub table_chunk: String,
    /// Similarity score (higher is better)
    pub score: f32,
}

impl IndexHit {
    /// Convert into the chunk it carries.
    #[must_use]
    pub fn into_chunk(self) -> TableChunk {
        TableChunk {
            table: self.table,
            ddl: self.table_chunk,
        }
    }
}

/// Index statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of indexed tables
    pub total_tables: u64,
    /// Most recent write
    pub last_updated: Option<DateTime<Utc>>,
}

/// Embedding output.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Approximate token count of the input
    pub token_count: usize,
}

// ============================================================================
// Models and routing
// ============================================================================

/// The job a roster model is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Routing,
    Summary,
    Reranking,
    Explanation,
    Generation,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Routing => "routing",
            Self::Summary => "summary",
            Self::Reranking => "reranking",
            Self::Explanation => "explanation",
            Self::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// Classification of a user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteLabel {
    /// Read data from the database
    GenerateSql,
    /// Analyze data already in the conversation
    AnalyzeData,
    /// The model could not tell what is asked
    NotDefined,
    /// DDL/DML-flavored request, rejected by policy
    NotAllowed,
}

impl RouteLabel {
    /// Every label, in prompt order.
    pub const ALL: [RouteLabel; 4] = [
        Self::GenerateSql,
        Self::AnalyzeData,
        Self::NotDefined,
        Self::NotAllowed,
    ];

    /// Wire name of the label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateSql => "generate_sql",
            Self::AnalyzeData => "analyze_data",
            Self::NotDefined => "not_defined",
            Self::NotAllowed => "not_allowed",
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| format!("unknown label: {s}"))
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Wire name used by chat-completion APIs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
