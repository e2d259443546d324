//! Ollama chat backend.

use async_trait::async_trait;
use nl2sql_core::{ChatMessage, GenerateError, TextGenerator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{build_client, send_json, GenerationParams};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Chat backend for a local or remote Ollama server.
pub struct OllamaChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    params: GenerationParams,
}

impl OllamaChat {
    /// Create a backend. `endpoint` defaults to `http://localhost:11434`.
    pub fn new(
        model: impl Into<String>,
        endpoint: Option<String>,
        params: GenerationParams,
    ) -> Result<Self, GenerateError> {
        Ok(Self {
            client: build_client(params.timeout)?,
            endpoint: endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            params,
        })
    }

    fn request<'a>(&'a self, messages: &'a [ChatMessage], format: Option<&'a Value>) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            format,
            options: Options {
                temperature: self.params.temperature,
                num_predict: self.params.max_tokens,
            },
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<String, GenerateError> {
        let url = format!("{}/api/chat", self.endpoint);
        let response: ChatResponse = send_json(self.client.post(&url).json(body)).await?;
        Ok(response.message.content)
    }
}

#[async_trait]
impl TextGenerator for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GenerateError> {
        debug!("Calling {} ({} messages)", self.model, messages.len());
        self.send(&self.request(messages, None)).await
    }

    /// Ollama constrains decoding to the schema itself.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, GenerateError> {
        let messages = [ChatMessage::user(prompt)];
        let raw = self.send(&self.request(&messages, Some(schema))).await?;
        serde_json::from_str(raw.trim()).map_err(|e| GenerateError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_format_and_options() {
        let chat = OllamaChat::new("llama3.2", None, GenerationParams::default()).unwrap();
        let schema = serde_json::json!({"type": "object"});
        let messages = [ChatMessage::user("classify")];

        let json = serde_json::to_value(chat.request(&messages, Some(&schema))).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"]["type"], "object");
        assert_eq!(json["options"]["num_predict"], 4000);

        let plain = serde_json::to_value(chat.request(&messages, None)).unwrap();
        assert!(plain.get("format").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"model":"llama3.2","message":{"role":"assistant","content":"ok"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "ok");
    }

    #[test]
    fn test_endpoint_default() {
        let chat = OllamaChat::new("m", None, GenerationParams::default()).unwrap();
        assert_eq!(chat.endpoint, DEFAULT_ENDPOINT);
    }
}
