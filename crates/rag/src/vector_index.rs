//! Vector index abstraction for document chunks.

use crate::types::{DocumentChunk, ScoredChunk, SourceDocument};
use wikiqa_core::AppResult;

/// Trait for vector index backends.
///
/// Methods take `&self` so one index can be shared between concurrent
/// queries; implementations synchronise internally.
pub trait VectorIndex: Send + Sync {
    /// Atomically replace a source and all of its chunks.
    ///
    /// Chunks previously stored for the source are removed first, so
    /// re-ingesting never duplicates.
    fn replace_source(&self, source: &SourceDocument, chunks: &[DocumentChunk]) -> AppResult<()>;

    /// Remove a source and its chunks. Returns whether the source existed.
    fn delete_source(&self, source_id: &str) -> AppResult<bool>;

    /// Look up a source by id.
    fn get_source(&self, source_id: &str) -> AppResult<Option<SourceDocument>>;

    /// All sources, ordered by path.
    fn list_sources(&self) -> AppResult<Vec<SourceDocument>>;

    /// Top-k chunks by cosine similarity to `query_embedding`.
    ///
    /// Ordered by descending score, ties broken by ascending chunk id.
    /// Fails if stored embeddings have a different dimension than the query.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>>;

    /// Returns (sources_count, chunks_count).
    fn stats(&self) -> AppResult<(u32, u32)>;

    /// Remove all chunks and sources.
    fn reset(&self) -> AppResult<()>;
}
