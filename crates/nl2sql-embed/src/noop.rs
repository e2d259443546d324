//! No-op embedder for tests.

use async_trait::async_trait;
use nl2sql_core::{EmbedError, Embedder, EmbeddingOutput};

/// Embedder that returns zero-vectors.
///
/// Every search against an index built with it scores 0, so it is only
/// useful where ranking does not matter.
pub struct NoopEmbedder {
    dimension: usize,
}

impl NoopEmbedder {
    /// Create a new no-op embedder with default dimension (384).
    #[must_use]
    pub fn new() -> Self {
        Self { dimension: 384 }
    }

    /// Create a new no-op embedder with custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for NoopEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for NoopEmbedder {
    fn model_name(&self) -> &str {
        "noop"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts
            .iter()
            .map(|_| EmbeddingOutput {
                embedding: vec![0.0; self.dimension],
                token_count: 0,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_defaults() {
        let embedder = NoopEmbedder::default();
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.model_name(), "noop");
        assert_eq!(NoopEmbedder::with_dimension(16).dimension(), 16);
    }

    #[tokio::test]
    async fn test_noop_embed_text() {
        let embedder = NoopEmbedder::with_dimension(8);
        let outputs = embedder.embed_text(&["SALES", "TIMES"]).await.unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].embedding.len(), 8);
        assert!(outputs[1].embedding.iter().all(|&v| v == 0.0));
    }

    #[tokio::test]
    async fn test_noop_embed_query() {
        let embedder = NoopEmbedder::new();
        let output = embedder.embed_query("how many customers").await.unwrap();
        assert_eq!(output.embedding.len(), 384);
    }
}
