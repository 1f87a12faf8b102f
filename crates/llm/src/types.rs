//! LLM backend types.

use serde::{Deserialize, Serialize};

/// Supported generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    /// LM Studio local server (OpenAI-compatible API)
    LmStudio,
    /// Ollama native API
    Ollama,
    /// OpenAI hosted API
    OpenAi,
}

impl BackendType {
    /// Parse backend type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lm-studio" | "lmstudio" => Some(Self::LmStudio),
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    /// Get the canonical backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LmStudio => "lm-studio",
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }

    /// Base URL used when none is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::LmStudio => "http://localhost:1234/v1",
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::LmStudio => "phi-3-mini-4k-instruct",
            Self::Ollama => "phi3",
            Self::OpenAi => "gpt-4",
        }
    }

    /// Whether the backend refuses requests without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
