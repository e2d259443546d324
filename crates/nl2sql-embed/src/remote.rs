//! HTTP embedding backends.
//!
//! Both speak JSON over `reqwest`. The OpenAI backend works with any
//! endpoint implementing `POST {endpoint}/embeddings`; the Ollama backend
//! uses `POST {endpoint}/api/embed`.

use std::time::Duration;

use async_trait::async_trait;
use nl2sql_core::{EmbedError, Embedder, EmbeddingOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, EmbedError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EmbedError::Request(e.to_string()))
}

async fn post_json<T: for<'de> Deserialize<'de>>(
    request: reqwest::RequestBuilder,
    backend: &str,
) -> Result<T, EmbedError> {
    let response = request
        .send()
        .await
        .map_err(|e| EmbedError::Request(format!("{backend}: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(EmbedError::Request(format!(
            "{backend} API error {status}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| EmbedError::Inference(format!("{backend}: {e}")))
}

fn into_outputs(
    texts: &[&str],
    vectors: Vec<Vec<f32>>,
    expected: usize,
) -> Result<Vec<EmbeddingOutput>, EmbedError> {
    if vectors.len() != texts.len() {
        return Err(EmbedError::Inference(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    vectors
        .into_iter()
        .zip(texts)
        .map(|(embedding, text)| {
            if embedding.len() != expected {
                return Err(EmbedError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Ok(EmbeddingOutput {
                embedding,
                token_count: text.split_whitespace().count(),
            })
        })
        .collect()
}

// ============================================================================
// OpenAI
// ============================================================================

/// OpenAI-compatible embedding backend.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Create a new backend.
    ///
    /// `endpoint` defaults to the public OpenAI API.
    pub fn new(
        api_key: String,
        model: String,
        endpoint: Option<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint
                .unwrap_or_else(|| OPENAI_DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} texts with {}", texts.len(), self.model);

        let url = format!("{}/embeddings", self.endpoint);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        let response: OpenAiResponse = post_json(request, "OpenAI").await?;
        let vectors = response.data.into_iter().map(|d| d.embedding).collect();
        into_outputs(texts, vectors, self.dimension)
    }
}

// ============================================================================
// Ollama
// ============================================================================

/// Ollama embedding backend.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Create a new backend. `endpoint` defaults to `http://localhost:11434`.
    pub fn new(
        model: String,
        endpoint: Option<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint
                .unwrap_or_else(|| OLLAMA_DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} texts with {}", texts.len(), self.model);

        let url = format!("{}/api/embed", self.endpoint);
        let request = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        let response: OllamaResponse = post_json(request, "Ollama").await?;
        into_outputs(texts, response.embeddings, self.dimension)
    }
}
