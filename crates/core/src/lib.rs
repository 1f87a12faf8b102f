//! wikiqa core library
//!
//! Foundational utilities shared by every wikiqa crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, RagSettings};
pub use error::{AppError, AppResult};
