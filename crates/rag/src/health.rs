//! Reachability checks for the index and the backends the pipeline uses.

use crate::config;
use crate::embeddings::{create_provider, EmbeddingConfig};
use crate::index::SqliteIndex;
use crate::rerank::CrossEncoderReranker;
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wikiqa_core::{AppConfig, AppError, AppResult};
use wikiqa_llm::create_client;

const OK: &str = "ok";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Per-service status: `"ok"` or `"error: <reason>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, String>,
}

impl HealthReport {
    /// Healthy only if every service reports `"ok"`.
    pub fn from_services(services: BTreeMap<String, String>) -> Self {
        let status = if services.values().all(|v| v == OK) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            timestamp: Utc::now(),
            services,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

fn service_status(result: AppResult<()>) -> String {
    match result {
        Ok(()) => OK.to_string(),
        Err(e) => format!("error: {}", e),
    }
}

/// Check the index, embedding provider, LLM backend and (if remote) reranker.
pub async fn check_health(app: &AppConfig) -> HealthReport {
    let mut services = BTreeMap::new();

    let index_config = config::load_index_config(&app.workspace);
    services.insert("index".to_string(), service_status(check_index(app)));

    // Query-time embeddings come from the index config when there is one.
    let embedding = match index_config {
        Ok(Some(cfg)) => cfg.embedding,
        _ => EmbeddingConfig::from_settings(&app.rag),
    };
    let embeddings = create_provider(&embedding).await.map(|_| ());
    services.insert("embeddings".to_string(), service_status(embeddings));

    services.insert("llm".to_string(), service_status(check_llm(app).await));

    if app.rag.reranker == "cross-encoder" {
        services.insert("reranker".to_string(), service_status(check_reranker(app).await));
    }

    let report = HealthReport::from_services(services);
    tracing::info!("Health check: {:?}", report.status);
    report
}

fn check_index(app: &AppConfig) -> AppResult<()> {
    let index_path = config::get_index_path(&app.workspace);
    if !index_path.exists() {
        return Err(AppError::Index("no index, run 'wikiqa ingest'".to_string()));
    }

    let (sources, chunks) = SqliteIndex::open(&index_path)?.stats()?;
    tracing::debug!("Index has {} sources, {} chunks", sources, chunks);
    Ok(())
}

async fn check_llm(app: &AppConfig) -> AppResult<()> {
    let api_key = app.resolve_api_key();
    let client = create_client(&app.backend, app.endpoint.as_deref(), api_key.as_deref())?;
    let status = client.health_check().await?;
    tracing::debug!("LLM backend {}: {}", client.provider_name(), status);
    Ok(())
}

async fn check_reranker(app: &AppConfig) -> AppResult<()> {
    let endpoint = app
        .rag
        .reranker_endpoint
        .as_deref()
        .ok_or_else(|| AppError::Config("rerankerEndpoint is not set".to_string()))?;
    CrossEncoderReranker::new(endpoint)?.health_check().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_from_services() {
        let mut services = BTreeMap::new();
        services.insert("index".to_string(), "ok".to_string());
        services.insert("llm".to_string(), "ok".to_string());
        assert!(HealthReport::from_services(services.clone()).is_healthy());

        services.insert("llm".to_string(), "error: connection refused".to_string());
        let report = HealthReport::from_services(services);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(serde_json::to_value(report.status).unwrap(), "degraded");
    }

    #[test]
    fn test_missing_index_is_reported() {
        let temp = TempDir::new().unwrap();
        let app = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..AppConfig::default()
        };

        let status = service_status(check_index(&app));
        assert!(status.starts_with("error:"));
        assert!(status.contains("wikiqa ingest"));
    }

    #[tokio::test]
    async fn test_unreachable_llm_degrades() {
        let temp = TempDir::new().unwrap();
        let app = AppConfig {
            workspace: temp.path().to_path_buf(),
            backend: "ollama".to_string(),
            endpoint: Some("http://127.0.0.1:9".to_string()),
            ..AppConfig::default()
        };

        let report = check_health(&app).await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.services["llm"].starts_with("error:"));
        assert_eq!(report.services["embeddings"], "ok");
        assert!(!report.services.contains_key("reranker"));
    }
}
