//! OpenAI-compatible chat completion backend.

use async_trait::async_trait;
use nl2sql_core::{ChatMessage, GenerateError, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{build_client, send_json, GenerationParams};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat backend for OpenAI and compatible servers (vLLM, LM Studio, gateways).
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    params: GenerationParams,
}

impl OpenAiChat {
    /// Create a backend. `endpoint` defaults to the public OpenAI API.
    pub fn new(
        model: impl Into<String>,
        endpoint: Option<String>,
        api_key: Option<String>,
        params: GenerationParams,
    ) -> Result<Self, GenerateError> {
        Ok(Self {
            client: build_client(params.timeout)?,
            endpoint: endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.into(),
            params,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GenerateError> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
        };

        let url = format!("{}/chat/completions", self.endpoint);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Calling {} ({} messages)", self.model, messages.len());
        let response: ChatResponse = send_json(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerateError::Malformed("response has no choices".to_string()))
    }
}
