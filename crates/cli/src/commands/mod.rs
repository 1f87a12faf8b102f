//! Command handlers for the wikiqa CLI.
//!
//! Each subcommand lives in its own module.

pub mod ask;
pub mod eval;
pub mod ingest;
pub mod maintenance;

pub use ask::AskCommand;
pub use eval::EvalCommand;
pub use ingest::IngestCommand;
pub use maintenance::{CleanCommand, HealthCommand, StatsCommand};

use wikiqa_core::{AppError, AppResult};

/// Pretty-print a value as JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
    println!("{}", output);
    Ok(())
}
