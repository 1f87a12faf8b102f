//! Error types for wikiqa.
//!
//! A single error enum covers every failure category in the workspace:
//! configuration, I/O, LLM backends, the vector index, retrieval, prompts,
//! request validation and evaluation.

use thiserror::Error;

/// Unified error type for wikiqa.
///
/// Library functions return `Result<T, AppError>`. A query rejected by the
/// injection guard is a normal pipeline outcome, not an error.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM and embedding backend errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector index storage errors
    #[error("Index error: {0}")]
    Index(String),

    /// Retrieval and reranking errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Rejected request input (query length, top_k range, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Evaluation harness errors
    #[error("Evaluation error: {0}")]
    Eval(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = AppError::InvalidInput("query is empty".to_string());
        assert_eq!(err.to_string(), "Invalid input: query is empty");

        let err = AppError::Retrieval("dimension mismatch".to_string());
        assert!(err.to_string().starts_with("Retrieval error"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
