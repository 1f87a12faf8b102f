//! Index configuration and on-disk layout.
//!
//! ```text
//! <workspace>/.wikiqa/
//!   index/config.yaml     embedding + chunking settings the index was built with
//!   index/index.sqlite    sources and chunks
//!   eval/runs.jsonl       evaluation history
//! ```

use crate::embeddings::EmbeddingConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wikiqa_core::{AppError, AppResult, RagSettings};

/// Settings recorded alongside the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// Embedding provider the chunks were embedded with
    pub embedding: EmbeddingConfig,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    pub chunk_overlap: usize,

    /// Last successful ingest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ingest_at: Option<DateTime<Utc>>,
}

impl IndexConfig {
    /// Index settings implied by the application's `rag:` section.
    pub fn from_settings(settings: &RagSettings) -> Self {
        Self {
            embedding: EmbeddingConfig::from_settings(settings),
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            last_ingest_at: None,
        }
    }
}

/// Load the index config, or `None` when nothing has been ingested yet.
pub fn load_index_config(workspace: &Path) -> AppResult<Option<IndexConfig>> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("No index config at {:?}", config_path);
        return Ok(None);
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Index(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: IndexConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Index(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Loaded index config from {:?}", config_path);
    Ok(Some(config))
}

/// Save the index config.
pub fn save_index_config(workspace: &Path, config: &IndexConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Index(format!("Failed to create index directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Index(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Index(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved index config to {:?}", config_path);
    Ok(())
}

/// Directory holding the index and its config.
pub fn get_index_dir(workspace: &Path) -> PathBuf {
    workspace.join(".wikiqa").join("index")
}

/// Path to the index config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    get_index_dir(workspace).join("config.yaml")
}

/// Path to the SQLite index.
pub fn get_index_path(workspace: &Path) -> PathBuf {
    get_index_dir(workspace).join("index.sqlite")
}

/// Path to the evaluation run log.
pub fn get_eval_runs_path(workspace: &Path) -> PathBuf {
    workspace.join(".wikiqa").join("eval").join("runs.jsonl")
}
