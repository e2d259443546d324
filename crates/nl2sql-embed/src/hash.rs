//! Offline feature-hashing embedder.
//!
//! Each lowercase word and adjacent word pair is hashed with blake3 into one
//! signed bucket of a fixed-size vector, which is then L2-normalized. Texts
//! sharing vocabulary (table names, column names, business terms) end up
//! close under cosine similarity without any model download.

use async_trait::async_trait;
use nl2sql_core::{EmbedError, Embedder, EmbeddingOutput};

/// Backend identifier recorded on index entries.
pub const HASH_MODEL_NAME: &str = "local-hash-v1";

/// Smallest supported dimension.
const MIN_DIMENSION: usize = 8;

/// Deterministic embedder based on hashed word features.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder producing `dimension`-sized vectors (at least 8).
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(MIN_DIMENSION),
        }
    }

    /// Embed one text.
    #[must_use]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for feature in features(text) {
            let hash = blake3::hash(feature.as_bytes());
            let bytes = hash.as_bytes();
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[..8]);
            let value = u64::from_le_bytes(word);

            let index = (value % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + f32::from(bytes[9]) / 255.0;
            vector[index] += sign * weight;
        }
        normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        HASH_MODEL_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| EmbeddingOutput {
                embedding: self.embed_one(text),
                token_count: text.split_whitespace().count(),
            })
            .collect())
    }
}

/// Word and bigram features of a text.
fn features(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut out = Vec::with_capacity(words.len() * 2);
    for (i, word) in words.iter().enumerate() {
        out.push(format!("w:{word}"));
        if let Some(next) = words.get(i + 1) {
            out.push(format!("b:{word}_{next}"));
        }
    }
    out
}

fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::DistanceMetric;

    #[test]
    fn test_dimension_floor() {
        assert_eq!(HashEmbedder::new(2).dimension(), MIN_DIMENSION);
        assert_eq!(HashEmbedder::default().dimension(), 384);
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(embedder.embed_one("sales by region"), embedder.embed_one("sales by region"));
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed_one("customer orders per month");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.embed_one("  ,; ").iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(256);
        let sales = embedder.embed_one("SALES\nSummary:\nsales amount per product and channel");
        let hr = embedder.embed_one("EMPLOYEES\nSummary:\nemployee hire date and salary");
        let query = embedder.embed_one("total sales amount per channel");

        let metric = DistanceMetric::Cosine;
        assert!(metric.score(&query, &sales) > metric.score(&query, &hr));
    }

    #[tokio::test]
    async fn test_embed_text_counts_tokens() {
        let embedder = HashEmbedder::new(32);
        let outputs = embedder.embed_text(&["one two three"]).await.unwrap();
        assert_eq!(outputs[0].token_count, 3);
        assert_eq!(outputs[0].embedding.len(), 32);
    }
}
