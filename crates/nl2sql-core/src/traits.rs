//! Core traits for nl2sql components.
//!
//! This module defines the capability interfaces the pipeline consumes:
//!
//! - [`Embedder`]: Generate vector embeddings
//! - [`TextGenerator`]: Invoke a language model
//! - [`SchemaIndex`]: Store and search table summaries
//! - [`SchemaSource`]: Extract the raw schema from a database
//! - [`SyntaxValidator`]: Check a statement without executing it
//! - [`StatementRunner`]: Execute a validated statement
//! - [`SampleSource`]: Look up example questions per table
//!
//! Backends are swapped by configuration; nothing downstream depends on a
//! concrete implementation.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DbError, EmbedError, GenerateError, IndexError, SampleError};
use crate::text::json_payload;
use crate::types::{ChatMessage, EmbeddingOutput, IndexEntry, IndexHit, IndexQuery, IndexStats};

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError>;

    /// Embed a query (may use different instruction).
    async fn embed_query(&self, query: &str) -> Result<EmbeddingOutput, EmbedError> {
        let results = self.embed_text(&[query]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("empty embedding result".to_string()))
    }
}

// ============================================================================
// Text generation
// ============================================================================

/// Trait for language-model backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Complete a chat conversation, returning the assistant's text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GenerateError>;

    /// Complete a single prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }

    /// Complete a prompt whose answer must be a JSON object matching `schema`.
    ///
    /// Backends with native structured output override this; the default
    /// extracts the first JSON payload from a plain completion.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, GenerateError> {
        let title = schema.get("title").and_then(Value::as_str).unwrap_or("-");
        debug!(
            "Structured output requested from {} (schema title: {})",
            self.model_name(),
            title
        );
        let raw = self.generate(prompt).await?;
        let payload = json_payload(&raw)
            .ok_or_else(|| GenerateError::Malformed(format!("no JSON in response: {raw}")))?;
        serde_json::from_str(payload).map_err(|e| GenerateError::Malformed(e.to_string()))
    }
}

// ============================================================================
// Schema index
// ============================================================================

/// Trait for the persistent store of table summary embeddings.
///
/// Holds at most one entry per table. Writing an entry for a table that is
/// already present replaces it as a whole.
#[async_trait]
pub trait SchemaIndex: Send + Sync {
    /// Initialize the index.
    async fn init(&self) -> Result<(), IndexError>;

    /// Insert entries, replacing any existing entry for the same table.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError>;

    /// Delete the entry for a table. Returns the number of rows removed.
    async fn delete(&self, table: &str) -> Result<u64, IndexError>;

    /// Drop every entry. Returns the number of rows removed.
    async fn clear(&self) -> Result<u64, IndexError>;

    /// Nearest entries to the query embedding, best first.
    async fn search(&self, query: IndexQuery) -> Result<Vec<IndexHit>, IndexError>;

    /// Identifiers of all indexed tables.
    async fn tables(&self) -> Result<Vec<String>, IndexError>;

    /// Get index statistics.
    async fn stats(&self) -> Result<IndexStats, IndexError>;
}

// ============================================================================
// Database access
// ============================================================================

/// Trait for extracting the raw schema of the target database.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Every table definition as `CREATE TABLE` text.
    async fn raw_schema(&self) -> Result<String, DbError>;
}

/// Trait for non-executing statement checks against the target engine.
#[async_trait]
pub trait SyntaxValidator: Send + Sync {
    /// Check a statement. Must not mutate data or return rows.
    async fn check(&self, statement: &str) -> Result<(), DbError>;

    /// Whether the statement passes [`SyntaxValidator::check`].
    async fn validate(&self, statement: &str) -> bool {
        match self.check(statement).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Statement rejected: {}", e);
                false
            }
        }
    }
}

/// Trait for executing a validated statement.
#[async_trait]
pub trait StatementRunner: Send + Sync {
    /// Run a read-only statement, returning one JSON object per row.
    async fn run(&self, statement: &str) -> Result<Vec<Map<String, Value>>, DbError>;
}

// ============================================================================
// Sample queries
// ============================================================================

/// Trait for example questions associated with a table.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Example questions for a table (uppercase id). May be empty.
    async fn samples(&self, table: &str) -> Result<Vec<String>, SampleError>;
}
