//! Grounded answer generation.

use crate::types::ScoredChunk;
use std::collections::HashMap;
use std::sync::Arc;
use wikiqa_core::AppResult;
use wikiqa_llm::{LlmClient, LlmRequest};
use wikiqa_prompt::{build_prompt, PromptDefinition};

/// Answer returned when retrieval produced no context.
pub const NO_CONTEXT_ANSWER: &str = "I don't have enough information to answer this question.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Format chunks as `Document: <file>` blocks for the prompt.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("Document: {}\n{}", c.chunk.document_name(), c.chunk.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Produces answers from a query and its context chunks via an LLM backend.
pub struct Generator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    temperature: f32,
    max_tokens: u32,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            temperature: 0.0,
            max_tokens: 500,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn backend(&self) -> &str {
        self.client.provider_name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an answer grounded in `chunks`, in the order given.
    ///
    /// Without chunks the backend is not called and [`NO_CONTEXT_ANSWER`]
    /// is returned.
    pub async fn generate(&self, query: &str, chunks: &[ScoredChunk]) -> AppResult<String> {
        if chunks.is_empty() {
            tracing::info!("No context chunks, skipping generation");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let mut variables = HashMap::new();
        variables.insert("context".to_string(), format_context(chunks));
        variables.insert("question".to_string(), query.to_string());
        let built = build_prompt(&self.prompt, variables)?;

        let mut request = LlmRequest::new(built.user, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            "Generating answer with {} (model: {}, {} context chunks)",
            self.client.provider_name(),
            self.model,
            chunks.len()
        );

        let response = self.client.complete(&request).await?;

        let answer = response.content.trim().to_string();
        tracing::debug!("Generated answer of {} chars", answer.chars().count());
        Ok(answer)
    }
}
