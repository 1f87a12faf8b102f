//! Configuration management for wikiqa.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! - Built-in defaults
//! - Config file (`.wikiqa/config.yaml` in the workspace, or `WIKIQA_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! All on-disk state (index, prompts, evaluation runs) lives under `.wikiqa/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// LLM backends the generator can talk to.
pub const KNOWN_BACKENDS: [&str; 3] = ["lm-studio", "ollama", "openai"];

/// Reranker kinds accepted in `rag.reranker`.
pub const KNOWN_RERANKERS: [&str; 3] = ["lexical", "cross-encoder", "none"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .wikiqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM backend ("lm-studio", "ollama", "openai")
    pub backend: String,

    /// Model identifier; `None` means the backend's default model
    pub model: Option<String>,

    /// Backend base URL; `None` means the backend's default endpoint
    pub endpoint: Option<String>,

    /// API key for the LLM backend
    pub api_key: Option<String>,

    /// Environment variable holding the API key (from config file)
    pub api_key_env: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format ("pretty" or "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Retrieval, reranking and generation settings
    pub rag: RagSettings,
}

/// Pipeline settings, read from the `rag:` section of config.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagSettings {
    /// Embedding provider used when building the index ("trigram", "ollama")
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Embedding vector dimension
    pub embedding_dim: usize,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Default number of chunks handed to the generator
    pub top_k: u32,

    /// Candidates retrieved before reranking
    pub rerank_candidates: u32,

    /// Reranker kind ("lexical", "cross-encoder", "none")
    pub reranker: String,

    /// Base URL of a cross-encoder rerank service
    pub reranker_endpoint: Option<String>,

    /// Minimum cosine similarity for a retrieved chunk
    pub min_score: Option<f32>,

    /// Sampling temperature for answer generation
    pub temperature: f32,

    /// Maximum tokens in a generated answer
    pub max_tokens: u32,

    /// Prompt definition used by the generator
    pub prompt_id: String,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            embedding_dim: 384,
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            rerank_candidates: 20,
            reranker: "lexical".to_string(),
            reranker_endpoint: None,
            min_score: None,
            temperature: 0.0,
            max_tokens: 500,
            prompt_id: "rag.answer.default".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    rag: Option<RagSettings>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    backend: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            backend: "lm-studio".to_string(),
            model: None,
            endpoint: None,
            api_key: None,
            api_key_env: None,
            log_level: None,
            log_format: "pretty".to_string(),
            verbose: false,
            no_color: false,
            rag: RagSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment.
    ///
    /// Environment variables:
    /// - `WIKIQA_WORKSPACE`: Override workspace path
    /// - `WIKIQA_CONFIG`: Path to config file
    /// - `WIKIQA_BACKEND`: LLM backend
    /// - `WIKIQA_MODEL`: Model identifier
    /// - `WIKIQA_LLM_URL`: Backend base URL
    /// - `WIKIQA_API_KEY` / `OPENAI_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use wikiqa_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], but with workspace and config file given by the caller.
    ///
    /// Explicit arguments win over `WIKIQA_WORKSPACE` / `WIKIQA_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let explicit_workspace = workspace.or_else(|| {
            std::env::var("WIKIQA_WORKSPACE")
                .ok()
                .map(PathBuf::from)
        });
        if let Some(workspace) = &explicit_workspace {
            config.workspace = workspace.clone();
        }

        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        } else if let Ok(config_file) = std::env::var("WIKIQA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".wikiqa/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
            // The file's workspace is only a fallback for -w / WIKIQA_WORKSPACE
            if let Some(workspace) = explicit_workspace {
                config.workspace = workspace;
            }
        }

        // Environment variables override YAML config
        if let Ok(backend) = std::env::var("WIKIQA_BACKEND") {
            config.backend = backend;
        }

        if let Ok(model) = std::env::var("WIKIQA_MODEL") {
            config.model = Some(model);
        }

        if let Ok(endpoint) = std::env::var("WIKIQA_LLM_URL") {
            config.endpoint = Some(endpoint);
        }

        config.api_key = std::env::var("WIKIQA_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(backend) = llm.backend {
                result.backend = backend;
            }
            if llm.model.is_some() {
                result.model = llm.model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
            result.api_key_env = llm.api_key_env;
        }

        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment and config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        backend: Option<String>,
        model: Option<String>,
        endpoint: Option<String>,
        log_level: Option<String>,
        log_format: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(backend) = backend {
            self.backend = backend;
        }

        if let Some(model) = model {
            self.model = Some(model);
        }

        if let Some(endpoint) = endpoint {
            self.endpoint = Some(endpoint);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .wikiqa directory.
    pub fn wikiqa_dir(&self) -> PathBuf {
        self.workspace.join(".wikiqa")
    }

    /// Ensure the .wikiqa directory exists.
    pub fn ensure_wikiqa_dir(&self) -> AppResult<()> {
        let dir = self.wikiqa_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .wikiqa directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve the API key for the configured backend.
    ///
    /// Order: explicit key (`WIKIQA_API_KEY`), the variable named by
    /// `llm.apiKeyEnv`, then `OPENAI_API_KEY` for the openai backend.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ref env_var) = self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return Some(key);
            }
        }

        if self.backend == "openai" {
            return std::env::var("OPENAI_API_KEY").ok();
        }

        None
    }

    /// Validate configuration values.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_BACKENDS.contains(&self.backend.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown backend: {}. Supported: {}",
                self.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        let rag = &self.rag;

        if rag.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than 0".to_string()));
        }

        if rag.chunk_overlap >= rag.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }

        if rag.embedding_dim == 0 {
            return Err(AppError::Config("embeddingDim must be greater than 0".to_string()));
        }

        if !(1..=20).contains(&rag.top_k) {
            return Err(AppError::Config(format!(
                "topK must be between 1 and 20, got {}",
                rag.top_k
            )));
        }

        if rag.rerank_candidates == 0 {
            return Err(AppError::Config(
                "rerankCandidates must be greater than 0".to_string(),
            ));
        }

        if !KNOWN_RERANKERS.contains(&rag.reranker.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown reranker: {}. Supported: {}",
                rag.reranker,
                KNOWN_RERANKERS.join(", ")
            )));
        }

        if rag.reranker == "cross-encoder" && rag.reranker_endpoint.is_none() {
            return Err(AppError::Config(
                "Reranker 'cross-encoder' requires rerankerEndpoint".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&rag.temperature) {
            return Err(AppError::Config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                rag.temperature
            )));
        }

        Ok(())
    }
}
