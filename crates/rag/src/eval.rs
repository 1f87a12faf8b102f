//! Retrieval evaluation over a golden set.
//!
//! A golden set is a JSON array of `{"question": ..., "document": ...}`
//! pairs, where `document` is the file name expected among the results.

use crate::config;
use crate::rerank::{rerank, Reranker};
use crate::retrieval::Retriever;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use wikiqa_core::{AppError, AppResult};

/// One question with the document that should answer it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenItem {
    pub question: String,
    pub document: String,
}

#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub top_k: usize,
    pub use_rerank: bool,

    /// Evaluate only the first N items
    pub sample_size: Option<usize>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            use_rerank: false,
            sample_size: None,
        }
    }
}

/// Aggregate metrics for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    #[serde(rename = "recall@3")]
    pub recall_at_3: f64,
    #[serde(rename = "recall@5")]
    pub recall_at_5: f64,
    pub mrr: f64,
    pub avg_latency_ms: f64,
    pub total_samples: usize,
    pub top_k: usize,
    pub use_rerank: bool,
    pub run_at: DateTime<Utc>,
}

/// Whether `expected` is among the first `k` retrieved documents.
pub fn recall_at_k(retrieved: &[String], expected: &str, k: usize) -> bool {
    retrieved.iter().take(k).any(|d| d == expected)
}

/// `1 / rank` of the first occurrence of `expected`, or 0 when absent.
pub fn reciprocal_rank(retrieved: &[String], expected: &str) -> f64 {
    retrieved
        .iter()
        .position(|d| d == expected)
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

pub fn load_golden_set(path: &Path) -> AppResult<Vec<GoldenItem>> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Eval(format!("Failed to read golden set {:?}: {}", path, e)))?;

    let items: Vec<GoldenItem> = serde_json::from_str(&content)
        .map_err(|e| AppError::Eval(format!("Invalid golden set {:?}: {}", path, e)))?;

    tracing::info!("Loaded {} Q&A pairs from {:?}", items.len(), path);
    Ok(items)
}

/// Run retrieval (and optionally reranking) for every item and aggregate.
pub async fn evaluate(
    retriever: &Retriever,
    reranker: Option<&dyn Reranker>,
    rerank_candidates: usize,
    items: &[GoldenItem],
    options: &EvalOptions,
) -> AppResult<EvalReport> {
    let samples = match options.sample_size {
        Some(n) => &items[..n.min(items.len())],
        None => items,
    };

    if samples.is_empty() {
        return Err(AppError::Eval("Golden set is empty".to_string()));
    }

    let reranker = if options.use_rerank {
        if reranker.is_none() {
            tracing::warn!("Reranking requested but no reranker is configured");
        }
        reranker
    } else {
        None
    };

    tracing::info!(
        "Evaluating {} samples (top_k: {}, rerank: {})",
        samples.len(),
        options.top_k,
        reranker.is_some()
    );

    let mut hits_at_3 = 0usize;
    let mut hits_at_5 = 0usize;
    let mut rr_sum = 0.0f64;
    let mut latency_sum_ms = 0.0f64;

    for (i, item) in samples.iter().enumerate() {
        let start = Instant::now();
        let chunks = match reranker {
            Some(reranker) => {
                let fetch_k = rerank_candidates.max(options.top_k);
                let candidates = retriever.retrieve(&item.question, fetch_k).await?;
                rerank(reranker, &item.question, candidates, options.top_k).await
            }
            None => retriever.retrieve(&item.question, options.top_k).await?,
        };
        latency_sum_ms += start.elapsed().as_secs_f64() * 1000.0;

        let documents: Vec<String> = chunks
            .iter()
            .map(|c| c.chunk.document_name().to_string())
            .collect();

        hits_at_3 += recall_at_k(&documents, &item.document, 3) as usize;
        hits_at_5 += recall_at_k(&documents, &item.document, 5) as usize;
        rr_sum += reciprocal_rank(&documents, &item.document);

        if (i + 1) % 10 == 0 {
            tracing::info!("Processed {}/{} samples", i + 1, samples.len());
        }
    }

    let n = samples.len() as f64;
    let report = EvalReport {
        recall_at_3: hits_at_3 as f64 / n,
        recall_at_5: hits_at_5 as f64 / n,
        mrr: rr_sum / n,
        avg_latency_ms: latency_sum_ms / n,
        total_samples: samples.len(),
        top_k: options.top_k,
        use_rerank: reranker.is_some(),
        run_at: Utc::now(),
    };

    tracing::info!(
        "Evaluation complete: recall@3 {:.3}, recall@5 {:.3}, MRR {:.3}, {:.1}ms avg",
        report.recall_at_3,
        report.recall_at_5,
        report.mrr,
        report.avg_latency_ms
    );

    Ok(report)
}

/// Append a report to `.wikiqa/eval/runs.jsonl`.
pub fn append_run(workspace: &Path, report: &EvalReport) -> AppResult<()> {
    let path = config::get_eval_runs_path(workspace);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let line = serde_json::to_string(report)
        .map_err(|e| AppError::Serialization(format!("Failed to serialize report: {}", e)))?;

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", line)?;

    tracing::debug!("Appended evaluation run to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn docs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recall_at_k() {
        let retrieved = docs(&["a.md", "b.md", "c.md", "d.md"]);
        assert!(recall_at_k(&retrieved, "c.md", 3));
        assert!(!recall_at_k(&retrieved, "d.md", 3));
        assert!(recall_at_k(&retrieved, "d.md", 5));
        assert!(!recall_at_k(&[], "a.md", 5));
    }

    #[test]
    fn test_reciprocal_rank_uses_first_occurrence() {
        let retrieved = docs(&["a.md", "b.md", "b.md"]);
        assert_eq!(reciprocal_rank(&retrieved, "a.md"), 1.0);
        assert_eq!(reciprocal_rank(&retrieved, "b.md"), 0.5);
        assert_eq!(reciprocal_rank(&retrieved, "z.md"), 0.0);
    }

    #[test]
    fn test_load_golden_set() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("golden.json");
        fs::write(&path, r#"[{"question": "Who?", "document": "a.md"}]"#).unwrap();

        let items = load_golden_set(&path).unwrap();
        assert_eq!(
            items,
            vec![GoldenItem {
                question: "Who?".to_string(),
                document: "a.md".to_string()
            }]
        );

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_golden_set(&path), Err(AppError::Eval(_))));
    }

    #[test]
    fn test_append_run_writes_jsonl() {
        let temp = TempDir::new().unwrap();
        let report = EvalReport {
            recall_at_3: 0.5,
            recall_at_5: 1.0,
            mrr: 0.75,
            avg_latency_ms: 2.0,
            total_samples: 2,
            top_k: 5,
            use_rerank: false,
            run_at: Utc::now(),
        };

        append_run(temp.path(), &report).unwrap();
        append_run(temp.path(), &report).unwrap();

        let content = fs::read_to_string(config::get_eval_runs_path(temp.path())).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["recall@5"], 1.0);
        assert_eq!(parsed["mrr"], 0.75);
    }
}
