//! Query-time retrieval: embed the query, search the index.

use crate::embeddings::EmbeddingProvider;
use crate::types::ScoredChunk;
use crate::vector_index::VectorIndex;
use std::sync::Arc;
use wikiqa_core::{AppError, AppResult};

/// Nearest-neighbour retriever over a vector index.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    min_score: Option<f32>,
}

impl Retriever {
    /// `embedder` must be the provider the index was built with.
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index,
            embedder,
            min_score: None,
        }
    }

    /// Drop results whose similarity is below `min_score`.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Top-`top_k` chunks for `query`, best first. An empty result is not an error.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed(query).await?;

        if query_embedding.len() != self.embedder.dimensions() {
            return Err(AppError::Retrieval(format!(
                "Query embedding has {} dimensions, provider '{}' declares {}",
                query_embedding.len(),
                self.embedder.provider_name(),
                self.embedder.dimensions()
            )));
        }

        let mut results = self.index.search(&query_embedding, top_k)?;

        if let Some(min_score) = self.min_score {
            let before = results.len();
            results.retain(|r| r.score >= min_score);
            tracing::debug!(
                "Filtered {} chunks below min score {:.3}",
                before - results.len(),
                min_score
            );
        }

        tracing::debug!(
            "Retrieved {} chunks, top score {:.3}",
            results.len(),
            results.first().map(|r| r.score).unwrap_or(0.0)
        );

        Ok(results)
    }
}
