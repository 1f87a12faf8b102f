//! LLM backend factory.
//!
//! Resolves a backend name from configuration into a ready client.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiCompatClient};
use crate::types::BackendType;
use std::sync::Arc;
use wikiqa_core::{AppError, AppResult};

/// Create an LLM client based on the backend name.
///
/// # Arguments
/// * `backend` - Backend identifier ("lm-studio", "ollama", "openai")
/// * `endpoint` - Optional custom base URL; the backend default otherwise
/// * `api_key` - Optional API key (required for "openai")
///
/// # Errors
/// Returns `AppError::Config` if the backend is unknown or a required key is missing.
pub fn create_client(
    backend: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let backend_type = BackendType::parse(backend)
        .ok_or_else(|| AppError::Config(format!("Unknown backend: {}", backend)))?;

    if backend_type.requires_api_key() && api_key.is_none() {
        return Err(AppError::Config(format!(
            "Backend '{}' requires an API key (set WIKIQA_API_KEY or OPENAI_API_KEY)",
            backend_type
        )));
    }

    let base_url = endpoint.unwrap_or(backend_type.default_endpoint());
    tracing::debug!("Creating {} client for {}", backend_type, base_url);

    match backend_type {
        BackendType::Ollama => Ok(Arc::new(OllamaClient::with_base_url(base_url)?)),
        BackendType::LmStudio | BackendType::OpenAi => Ok(Arc::new(OpenAiCompatClient::new(
            backend_type,
            base_url,
            api_key.map(str::to_string),
        )?)),
    }
}

/// Model to request from `backend`: the configured one, else the backend default.
pub fn resolve_model(backend: &str, model: Option<&str>) -> String {
    match model {
        Some(model) => model.to_string(),
        None => BackendType::parse(backend)
            .map(|b| b.default_model().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lm_studio_client() {
        let client = create_client("lm-studio", None, None).unwrap();
        assert_eq!(client.provider_name(), "lm-studio");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", None, None) {
            Err(err) => assert!(err.to_string().contains("requires an API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
        assert!(create_client("openai", None, Some("sk-test")).is_ok());
    }

    #[test]
    fn test_unknown_backend() {
        match create_client("claude", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown backend")),
            Ok(_) => panic!("Expected error for unknown backend"),
        }
    }

    #[test]
    fn test_resolve_model() {
        assert_eq!(resolve_model("ollama", None), "phi3");
        assert_eq!(resolve_model("lm-studio", None), "phi-3-mini-4k-instruct");
        assert_eq!(resolve_model("openai", Some("gpt-4o-mini")), "gpt-4o-mini");
    }
}
