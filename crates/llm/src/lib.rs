//! LLM integration crate for wikiqa.
//!
//! A backend-agnostic abstraction over the language models that generate
//! grounded answers.
//!
//! # Backends
//! - **LM Studio**: local OpenAI-compatible server (default)
//! - **Ollama**: local runtime, native API
//! - **OpenAI**: hosted API
//!
//! # Example
//! ```no_run
//! use wikiqa_llm::{create_client, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("ollama", None, None)?;
//! let request = LlmRequest::new("Hello, world!", "phi3");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, resolve_model};
pub use providers::{OllamaClient, OpenAiCompatClient};
pub use types::BackendType;
