//! OpenAI-compatible chat completions client.
//!
//! Serves both the hosted OpenAI API and LM Studio's local server, which
//! speaks the same `/chat/completions` protocol.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::types::BackendType;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wikiqa_core::{AppError, AppResult};

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatClient {
    backend: BackendType,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a client for `backend` rooted at `base_url` (e.g. `http://localhost:1234/v1`).
    pub fn new(
        backend: BackendType,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            backend,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn to_chat_request(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    fn convert_response(&self, request: &LlmRequest, response: ChatResponse) -> AppResult<LlmResponse> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            AppError::Llm(format!("{} returned no choices", self.backend))
        })?;

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content,
            model: response.model.unwrap_or_else(|| request.model.clone()),
            usage,
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider_name(&self) -> &str {
        self.backend.as_str()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to {}", self.backend);
        tracing::debug!("Request: model={}, prompt_len={}", request.model, request.prompt.len());

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.to_chat_request(request);

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::Llm(format!("Failed to send request to {}: {}", self.backend, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "{} API error ({}): {}",
                self.backend, status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::Llm(format!("Failed to parse {} response: {}", self.backend, e))
        })?;

        tracing::info!("Received completion from {}", self.backend);

        self.convert_response(request, chat)
    }

    async fn health_check(&self) -> AppResult<String> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| {
                AppError::Llm(format!("{} unreachable at {}: {}", self.backend, self.base_url, e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Llm(format!(
                "{} health check failed ({})",
                self.backend,
                response.status()
            )));
        }

        let models: ModelList = response.json().await.map_err(|e| {
            AppError::Llm(format!("Failed to parse {} model list: {}", self.backend, e))
        })?;

        let ids: Vec<&str> = models.data.iter().map(|m| m.id.as_str()).collect();
        Ok(format!("{} model(s) available: {}", ids.len(), ids.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm_studio() -> OpenAiCompatClient {
        OpenAiCompatClient::new(BackendType::LmStudio, "http://localhost:1234/v1/", None).unwrap()
    }

    #[test]
    fn test_provider_name_follows_backend() {
        assert_eq!(lm_studio().provider_name(), "lm-studio");

        let openai = OpenAiCompatClient::new(
            BackendType::OpenAi,
            "https://api.openai.com/v1",
            Some("sk-test".to_string()),
        )
        .unwrap();
        assert_eq!(openai.provider_name(), "openai");
    }

    #[test]
    fn test_chat_request_messages() {
        let client = lm_studio();
        assert_eq!(client.base_url, "http://localhost:1234/v1");

        let request = LlmRequest::new("Context: ...", "phi-3-mini-4k-instruct")
            .with_system("You are a helpful assistant")
            .with_temperature(0.0)
            .with_max_tokens(500);

        let chat = client.to_chat_request(&request);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.messages[1].role, "user");
        assert_eq!(chat.max_tokens, Some(500));
    }

    #[test]
    fn test_chat_request_without_system() {
        let chat = lm_studio().to_chat_request(&LlmRequest::new("hi", "phi3"));
        assert_eq!(chat.messages.len(), 1);
    }

    #[test]
    fn test_convert_response() {
        let client = lm_studio();
        let request = LlmRequest::new("q", "phi-3-mini-4k-instruct");
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"42"}}],
                "usage":{"prompt_tokens":10,"completion_tokens":1,"total_tokens":11}}"#,
        )
        .unwrap();

        let response = client.convert_response(&request, chat).unwrap();
        assert_eq!(response.content, "42");
        assert_eq!(response.model, "phi-3-mini-4k-instruct");
        assert_eq!(response.usage.total_tokens, 11);
    }

    #[test]
    fn test_convert_response_without_choices() {
        let client = lm_studio();
        let request = LlmRequest::new("q", "m");
        let chat: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(client.convert_response(&request, chat).is_err());
    }
}
