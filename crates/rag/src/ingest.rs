//! Document ingestion: walk → parse → chunk → embed → index.

use crate::chunker::{chunk_text, sha256_hex, source_id_for};
use crate::config::{self, IndexConfig};
use crate::embeddings::{create_provider, embed_in_batches, EmbeddingProvider};
use crate::index::SqliteIndex;
use crate::parser::{self, ContentType};
use crate::types::{DocumentChunk, IngestStats, SourceDocument};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::{DirEntry, WalkDir};
use wikiqa_core::{AppConfig, AppError, AppResult};

/// What to ingest.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Directory (or single file) holding the documents
    pub path: PathBuf,

    /// Re-index every file even if unchanged, and discard an index built
    /// with different embedding settings
    pub force: bool,
}

enum FileOutcome {
    Indexed { chunks: u32, bytes: u64 },
    Unchanged,
}

/// Ingest documents under `options.path` into the workspace index.
///
/// Re-ingesting a file replaces its chunks. Files whose content hash is
/// unchanged are skipped, and indexed sources under `options.path` whose
/// file is gone are removed.
pub async fn ingest(app: &AppConfig, options: &IngestOptions) -> AppResult<IngestStats> {
    let start = Instant::now();
    let workspace = &app.workspace;

    if !options.path.exists() {
        return Err(AppError::InvalidInput(format!(
            "Documents path does not exist: {:?}",
            options.path
        )));
    }

    // Source identity must not depend on how the path was spelled
    let root = canonicalize(&options.path)?;
    let canonical_workspace = canonicalize(workspace)?;

    tracing::info!("Starting ingest from {:?}", root);

    let mut index_config = IndexConfig::from_settings(&app.rag);
    let mut reindex_all = options.force;

    let index = SqliteIndex::open(&config::get_index_path(workspace))?;

    if let Some(existing) = config::load_index_config(workspace)? {
        if let Err(e) = existing.embedding.validate_consistency(&index_config.embedding) {
            if !options.force {
                return Err(AppError::Index(format!(
                    "{}. The index was built with different embedding settings; \
                     run 'wikiqa clean' or ingest with --force",
                    e
                )));
            }
            tracing::warn!("Embedding settings changed ({}), resetting index", e);
            index.reset()?;
        }

        if existing.chunk_size != index_config.chunk_size
            || existing.chunk_overlap != index_config.chunk_overlap
        {
            tracing::info!("Chunk settings changed, re-indexing all sources");
            reindex_all = true;
        }
    }

    let provider = create_provider(&index_config.embedding).await?;

    let mut stats = IngestStats::default();
    let mut seen: HashSet<String> = HashSet::new();

    for path in collect_files(&root) {
        let source_path = display_path(&canonical_workspace, &path);
        let source_id = source_id_for(&source_path);
        seen.insert(source_id.clone());

        match ingest_file(
            &index,
            provider.as_ref(),
            &index_config,
            &path,
            &source_path,
            &source_id,
            reindex_all,
        )
        .await
        {
            Ok(FileOutcome::Indexed { chunks, bytes }) => {
                stats.sources_indexed += 1;
                stats.chunks_count += chunks;
                stats.bytes_processed += bytes;
            }
            Ok(FileOutcome::Unchanged) => stats.sources_unchanged += 1,
            Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
        }
    }

    for source in index.list_sources()? {
        let in_scope = canonical_workspace.join(&source.path).starts_with(&root);
        if in_scope && !seen.contains(&source.id) && index.delete_source(&source.id)? {
            tracing::info!("Removed missing source {}", source.path);
            stats.sources_removed += 1;
        }
    }

    index_config.last_ingest_at = Some(Utc::now());
    config::save_index_config(workspace, &index_config)?;

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingest completed: {} indexed, {} unchanged, {} removed, {} chunks, {} bytes in {:.2}s",
        stats.sources_indexed,
        stats.sources_unchanged,
        stats.sources_removed,
        stats.chunks_count,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

/// Supported files under `root`, in a stable order. Hidden entries are skipped.
fn collect_files(root: &Path) -> Vec<PathBuf> {
    let is_hidden = |entry: &DirEntry| {
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
    };

    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| ContentType::from_path(p) != ContentType::Unsupported)
        .collect()
}

fn canonicalize(path: &Path) -> AppResult<PathBuf> {
    path.canonicalize()
        .map_err(|e| AppError::InvalidInput(format!("Cannot resolve path {:?}: {}", path, e)))
}

/// Workspace-relative path with `/` separators; absolute when outside the workspace.
///
/// Both arguments are expected to be canonical.
fn display_path(workspace: &Path, path: &Path) -> String {
    match path.strip_prefix(workspace) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

async fn ingest_file(
    index: &SqliteIndex,
    provider: &dyn EmbeddingProvider,
    index_config: &IndexConfig,
    path: &Path,
    source_path: &str,
    source_id: &str,
    reindex: bool,
) -> AppResult<FileOutcome> {
    let text = parser::parse_file(path)?;
    let content_hash = sha256_hex(text.as_bytes());

    if !reindex {
        if let Some(existing) = index.get_source(source_id)? {
            if existing.content_hash == content_hash {
                tracing::debug!("Unchanged: {}", source_path);
                return Ok(FileOutcome::Unchanged);
            }
        }
    }

    let candidates = chunk_text(
        source_id,
        &text,
        index_config.chunk_size,
        index_config.chunk_overlap,
    )?;

    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let embeddings =
        embed_in_batches(provider, &texts, index_config.embedding.batch_size).await?;

    if embeddings.len() != candidates.len() {
        return Err(AppError::Index(format!(
            "Expected {} embeddings, got {}",
            candidates.len(),
            embeddings.len()
        )));
    }

    let chunks: Vec<DocumentChunk> = candidates
        .into_iter()
        .zip(embeddings)
        .map(|(candidate, embedding)| DocumentChunk {
            id: candidate.id,
            source_id: candidate.source_id,
            source_path: source_path.to_string(),
            position: candidate.position,
            start: candidate.start,
            end: candidate.end,
            text: candidate.text,
            embedding: Some(embedding),
        })
        .collect();

    let bytes = text.len() as u64;
    let source = SourceDocument {
        id: source_id.to_string(),
        path: source_path.to_string(),
        content_hash,
        ingested_at: Utc::now(),
        size_bytes: bytes,
        chunk_count: chunks.len() as u32,
    };

    index.replace_source(&source, &chunks)?;

    tracing::debug!("Indexed {}: {} chunks, {} bytes", source_path, chunks.len(), bytes);

    Ok(FileOutcome::Indexed {
        chunks: source.chunk_count,
        bytes,
    })
}
