//! Second-stage reranking of retrieved candidates.
//!
//! A [`Reranker`] only scores texts; [`rerank`] owns the bookkeeping: it maps
//! scores back to candidates by position, drops anything the scorer made up,
//! and falls back to similarity order when the scorer fails.

use crate::embeddings::providers::trigram::content_terms;
use crate::types::{by_similarity, ScoredChunk};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use wikiqa_core::{AppError, AppResult, RagSettings};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Relevance of the text at `index` in the scored batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankScore {
    pub index: usize,
    pub score: f32,
}

/// Scores query/text pairs.
#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// Score every text against `query`. Results may come in any order.
    async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<RerankScore>>;
}

/// Build the reranker selected by `rag.reranker`; `None` for "none".
pub fn create_reranker(settings: &RagSettings) -> AppResult<Option<Arc<dyn Reranker>>> {
    match settings.reranker.as_str() {
        "lexical" => Ok(Some(Arc::new(LexicalReranker))),
        "cross-encoder" => {
            let endpoint = settings.reranker_endpoint.as_deref().ok_or_else(|| {
                AppError::Config("Reranker 'cross-encoder' requires rerankerEndpoint".to_string())
            })?;
            Ok(Some(Arc::new(CrossEncoderReranker::new(endpoint)?)))
        }
        "none" => Ok(None),
        other => Err(AppError::Config(format!("Unknown reranker: {}", other))),
    }
}

/// Rerank `candidates` for `query` and keep the best `top_k`.
///
/// Output is a subset of the input without duplicates. Similarity scores
/// are preserved next to the rerank score. Candidates the scorer skipped
/// fill remaining slots in similarity order.
pub async fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<ScoredChunk>,
    top_k: usize,
) -> Vec<ScoredChunk> {
    if candidates.is_empty() {
        return candidates;
    }

    tracing::info!(
        "Reranking {} candidates with '{}'",
        candidates.len(),
        reranker.name()
    );

    let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();

    let scores = match reranker.score(query, &texts).await {
        Ok(scores) => scores,
        Err(err) => {
            tracing::warn!("Reranker failed, falling back to similarity order: {}", err);
            Vec::new()
        }
    };

    let mut seen: HashSet<usize> = HashSet::new();
    let mut reranked: Vec<ScoredChunk> = Vec::new();
    let mut dropped = 0usize;

    for RerankScore { index, score } in scores {
        match candidates.get(index) {
            Some(candidate) if score.is_finite() && seen.insert(index) => {
                let mut chunk = candidate.clone();
                chunk.rerank_score = Some(score);
                reranked.push(chunk);
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} invalid or duplicate rerank scores", dropped);
    }

    reranked.sort_by(|a, b| {
        let (ra, rb) = (a.rerank_score.unwrap_or(f32::MIN), b.rerank_score.unwrap_or(f32::MIN));
        rb.total_cmp(&ra).then_with(|| by_similarity(a, b))
    });
    reranked.truncate(top_k);

    if reranked.len() < top_k {
        let mut rest: Vec<ScoredChunk> = candidates
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !seen.contains(i))
            .map(|(_, c)| c)
            .collect();
        rest.sort_by(by_similarity);
        reranked.extend(rest.into_iter().take(top_k - reranked.len()));
    }

    tracing::debug!("Reranking complete, returning top-{}", reranked.len());
    reranked
}

/// Offline reranker scoring IDF-weighted coverage of the query terms.
///
/// IDF is computed over the candidate set, so terms that appear in every
/// candidate count for little. Scores lie in `[0, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

#[async_trait::async_trait]
impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<RerankScore>> {
        let mut query_terms = content_terms(query);
        query_terms.sort();
        query_terms.dedup();

        let doc_terms: Vec<HashSet<String>> = texts
            .iter()
            .map(|t| content_terms(t).into_iter().collect())
            .collect();

        let n = texts.len() as f32;
        let idf: HashMap<&str, f32> = query_terms
            .iter()
            .map(|term| {
                let df = doc_terms.iter().filter(|d| d.contains(term)).count() as f32;
                (term.as_str(), ((n + 1.0) / (df + 1.0)).ln() + 1.0)
            })
            .collect();
        let total: f32 = idf.values().sum();

        Ok(doc_terms
            .iter()
            .enumerate()
            .map(|(index, terms)| {
                let matched: f32 = query_terms
                    .iter()
                    .filter(|t| terms.contains(*t))
                    .map(|t| idf[t.as_str()])
                    .sum();
                RerankScore {
                    index,
                    score: if total > 0.0 { matched / total } else { 0.0 },
                }
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

/// Remote cross-encoder speaking the text-embeddings-inference `/rerank` API.
pub struct CrossEncoderReranker {
    client: reqwest::Client,
    base_url: String,
}

impl CrossEncoderReranker {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Retrieval(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check the rerank service is up (`GET /health`).
    pub async fn health_check(&self) -> AppResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::Retrieval(format!("Reranker unreachable at {}: {}", self.base_url, e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::Retrieval(format!(
                "Reranker health check failed ({})",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Reranker for CrossEncoderReranker {
    fn name(&self) -> &str {
        "cross-encoder"
    }

    async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<RerankScore>> {
        let url = format!("{}/rerank", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&RerankRequest { query, texts })
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to call reranker: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Reranker error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse reranker response: {}", e)))
    }
}
