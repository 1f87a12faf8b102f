//! Index and retrieval type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A source document tracked by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// SHA-256 of the workspace-relative path
    pub id: String,

    /// Workspace-relative path
    pub path: String,

    /// SHA-256 of the file contents at ingest time
    pub content_hash: String,

    /// When this source was ingested
    pub ingested_at: DateTime<Utc>,

    /// Source size in bytes
    pub size_bytes: u64,

    /// Number of chunks created from this source
    pub chunk_count: u32,
}

/// A text chunk with its embedding.
///
/// Chunks are immutable once indexed; re-ingesting a source replaces all of
/// its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier derived from source id, position and text
    pub id: String,

    /// Owning source document ID
    pub source_id: String,

    /// Path of the owning source document
    pub source_path: String,

    /// Position within source
    pub position: u32,

    /// Byte offset where the chunk starts in the source text
    pub start: usize,

    /// Byte offset one past the chunk end
    pub end: usize,

    /// Text content
    pub text: String,

    /// Embedding vector (unit length for the built-in providers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    /// File name of the source document, used in prompts and citations.
    pub fn document_name(&self) -> &str {
        std::path::Path::new(&self.source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source_path)
    }
}

/// Chunk candidate produced by the chunker, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub id: String,
    pub source_id: String,
    pub position: u32,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A retrieved chunk with its similarity and optional rerank score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,

    /// Cosine similarity to the query
    pub score: f32,

    /// Relevance assigned by the reranker, if the chunk was reranked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl ScoredChunk {
    pub fn new(chunk: DocumentChunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            rerank_score: None,
        }
    }

    /// Score used for display: rerank score when present, else similarity.
    pub fn effective_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.score)
    }
}

/// Order by descending similarity, ties broken by ascending chunk id.
pub fn by_similarity(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

/// Statistics from an ingest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Files that were (re)indexed
    pub sources_indexed: u32,

    /// Files skipped because their content hash was unchanged
    pub sources_unchanged: u32,

    /// Sources removed because their file no longer exists
    pub sources_removed: u32,

    /// Number of chunks written
    pub chunks_count: u32,

    /// Total bytes read
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub sources_count: u32,
    pub chunks_count: u32,
    pub db_size_bytes: u64,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<usize>,
    pub last_ingest_at: Option<DateTime<Utc>>,
}
