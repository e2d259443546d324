//! # nl2sql-llm
//!
//! Language-model plumbing for nl2sql.
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`OpenAiChat`] | Any OpenAI-compatible `/chat/completions` endpoint |
//! | [`OllamaChat`] | Ollama `/api/chat`, with native JSON-schema output |
//! | [`ScriptedGenerator`] | Canned replies, for tests and dry runs |
//! | [`ModelRoster`] | Ordered models plus their [`RoleBindings`] |
//! | [`prompts`] | Prompt templates for every role |
//!
//! The same physical model may serve several roles; the roster holds each
//! model once and the bindings point into it.

pub mod ollama;
pub mod openai;
pub mod prompts;
pub mod roster;
pub mod scripted;

pub use ollama::OllamaChat;
pub use openai::OpenAiChat;
pub use roster::{ModelRoster, RoleBindings};
pub use scripted::ScriptedGenerator;

use std::time::Duration;

/// Sampling parameters shared by the HTTP backends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4000,
            timeout: Duration::from_secs(60),
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, nl2sql_core::GenerateError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| nl2sql_core::GenerateError::Request(e.to_string()))
}

/// Send a request and decode a successful JSON body.
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, nl2sql_core::GenerateError> {
    use nl2sql_core::GenerateError;

    let response = request
        .send()
        .await
        .map_err(|e| GenerateError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GenerateError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| GenerateError::Malformed(e.to_string()))
}
