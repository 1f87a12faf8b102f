//! Retrieval-augmented question answering over a local document wiki.
//!
//! Documents are chunked, embedded and stored in a SQLite vector index.
//! Questions go through [`RagPipeline`]: injection guard, retrieval,
//! optional reranking, grounded generation and PII scrubbing.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod eval;
pub mod generation;
pub mod health;
pub mod index;
pub mod ingest;
pub mod parser;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;
pub mod safety;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use eval::{EvalOptions, EvalReport, GoldenItem};
pub use generation::Generator;
pub use health::{check_health, HealthReport, HealthStatus};
pub use ingest::{ingest, IngestOptions};
pub use pipeline::{
    AskOptions, AskResponse, BlockedResponse, Citation, PipelineOutcome, RagPipeline,
    ResponseMetadata, StageTimings,
};
pub use rerank::{create_reranker, Reranker};
pub use retrieval::Retriever;
pub use safety::{GuardVerdict, InjectionGuard, PiiScrubber, RiskLevel, ScrubResult};
pub use types::{DocumentChunk, IndexStats, IngestStats, ScoredChunk, SourceDocument};

use index::SqliteIndex;
use std::path::Path;
use vector_index::VectorIndex;
use wikiqa_core::{AppError, AppResult};

/// Remove every source and chunk from the workspace index.
///
/// The index config is removed too, so the next ingest may use different
/// embedding settings.
pub fn clean(workspace: &Path) -> AppResult<()> {
    tracing::info!("Cleaning index in {:?}", workspace);

    let index_path = config::get_index_path(workspace);
    if !index_path.exists() {
        return Err(AppError::Index(format!(
            "No index found in {:?}",
            workspace
        )));
    }

    SqliteIndex::open(&index_path)?.reset()?;

    let config_path = config::get_config_path(workspace);
    if config_path.exists() {
        std::fs::remove_file(&config_path)?;
    }

    tracing::info!("Index cleaned");
    Ok(())
}

/// Statistics for the workspace index.
pub fn stats(workspace: &Path) -> AppResult<IndexStats> {
    let index_path = config::get_index_path(workspace);
    if !index_path.exists() {
        return Err(AppError::Index(format!(
            "No index found in {:?}. Run 'wikiqa ingest' first.",
            workspace
        )));
    }

    let (sources_count, chunks_count) = SqliteIndex::open(&index_path)?.stats()?;
    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);
    let index_config = config::load_index_config(workspace)?;

    Ok(IndexStats {
        sources_count,
        chunks_count,
        db_size_bytes,
        embedding_provider: index_config.as_ref().map(|c| c.embedding.provider.clone()),
        embedding_model: index_config.as_ref().map(|c| c.embedding.model.clone()),
        embedding_dim: index_config.as_ref().map(|c| c.embedding.dimensions),
        last_ingest_at: index_config.and_then(|c| c.last_ingest_at),
    })
}
