//! SQLite-backed vector index.
//!
//! Embeddings are stored as little-endian f32 blobs and scored with a
//! brute-force cosine scan, which is plenty for a wiki-sized corpus.

use crate::types::{by_similarity, DocumentChunk, ScoredChunk, SourceDocument};
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use wikiqa_core::{AppError, AppResult};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS sources (
        id TEXT PRIMARY KEY,
        path TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        ingested_at TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        chunk_count INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        start_offset INTEGER NOT NULL,
        end_offset INTEGER NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
"#;

/// Vector index stored in a single SQLite file.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) the index at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Index(format!("Failed to create index directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;

        let index = Self::with_connection(conn)?;
        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Ok(index)
    }

    /// In-memory index, used by tests and evaluation fixtures.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Index(format!("Failed to open in-memory index: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Index(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Index("Index connection lock poisoned".to_string()))
    }
}

fn row_to_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceDocument> {
    let ingested_at: String = row.get(3)?;
    let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(SourceDocument {
        id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        ingested_at,
        size_bytes: row.get::<_, i64>(4)? as u64,
        chunk_count: row.get::<_, i64>(5)? as u32,
    })
}

impl VectorIndex for SqliteIndex {
    fn replace_source(&self, source: &SourceDocument, chunks: &[DocumentChunk]) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;

        tx.execute("DELETE FROM chunks WHERE source_id = ?1", params![source.id])
            .map_err(|e| AppError::Index(format!("Failed to delete old chunks: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO sources (id, path, content_hash, ingested_at, size_bytes, chunk_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source.id,
                source.path,
                source.content_hash,
                source.ingested_at.to_rfc3339(),
                source.size_bytes as i64,
                source.chunk_count as i64,
            ],
        )
        .map_err(|e| AppError::Index(format!("Failed to insert source: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO chunks (id, source_id, position, start_offset, end_offset, text, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| AppError::Index(format!("Failed to prepare insert: {}", e)))?;

            for chunk in chunks {
                let embedding = chunk.embedding.as_ref().ok_or_else(|| {
                    AppError::Index(format!("Chunk {} missing embedding", chunk.id))
                })?;

                stmt.execute(params![
                    chunk.id,
                    source.id,
                    chunk.position as i64,
                    chunk.start as i64,
                    chunk.end as i64,
                    chunk.text,
                    embedding_to_bytes(embedding),
                ])
                .map_err(|e| AppError::Index(format!("Failed to insert chunk: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Index(format!("Failed to commit source: {}", e)))?;

        tracing::debug!("Stored {} chunks for {}", chunks.len(), source.path);
        Ok(())
    }

    fn delete_source(&self, source_id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM sources WHERE id = ?1", params![source_id])
            .map_err(|e| AppError::Index(format!("Failed to delete source: {}", e)))?;
        Ok(deleted > 0)
    }

    fn get_source(&self, source_id: &str) -> AppResult<Option<SourceDocument>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, path, content_hash, ingested_at, size_bytes, chunk_count FROM sources WHERE id = ?1",
            params![source_id],
            row_to_source,
        )
        .optional()
        .map_err(|e| AppError::Index(format!("Failed to load source: {}", e)))
    }

    fn list_sources(&self) -> AppResult<Vec<SourceDocument>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, path, content_hash, ingested_at, size_bytes, chunk_count FROM sources ORDER BY path",
            )
            .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

        let sources = stmt
            .query_map([], row_to_source)
            .map_err(|e| AppError::Index(format!("Failed to list sources: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Index(format!("Failed to read source row: {}", e)))?;

        Ok(sources)
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.source_id, s.path, c.position, c.start_offset, c.end_offset, c.text, c.embedding
                 FROM chunks c JOIN sources s ON s.id = c.source_id",
            )
            .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(DocumentChunk {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    source_path: row.get(2)?,
                    position: row.get::<_, i64>(3)? as u32,
                    start: row.get::<_, i64>(4)? as usize,
                    end: row.get::<_, i64>(5)? as usize,
                    text: row.get(6)?,
                    embedding: Some(bytes_to_embedding(&row.get::<_, Vec<u8>>(7)?)),
                })
            })
            .map_err(|e| AppError::Index(format!("Failed to query chunks: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            let chunk = row.map_err(|e| AppError::Index(format!("Failed to read chunk row: {}", e)))?;
            let embedding = chunk.embedding.as_deref().unwrap_or_default();

            if embedding.len() != query_embedding.len() {
                return Err(AppError::Retrieval(format!(
                    "Embedding dimension mismatch: query has {}, index has {}. Re-ingest with the current embedding settings.",
                    query_embedding.len(),
                    embedding.len()
                )));
            }

            let score = cosine_similarity(query_embedding, embedding);
            results.push(ScoredChunk::new(chunk, score));
        }

        results.sort_by(by_similarity);
        results.truncate(top_k);

        tracing::debug!(
            "Retrieved {} chunks (requested top-{})",
            results.len(),
            top_k
        );

        Ok(results)
    }

    fn stats(&self) -> AppResult<(u32, u32)> {
        let conn = self.lock()?;

        let sources_count: u32 = conn
            .query_row("SELECT COUNT(*) FROM sources", [], |row| {
                row.get::<_, i64>(0).map(|v| v as u32)
            })
            .map_err(|e| AppError::Index(format!("Failed to count sources: {}", e)))?;

        let chunks_count: u32 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| {
                row.get::<_, i64>(0).map(|v| v as u32)
            })
            .map_err(|e| AppError::Index(format!("Failed to count chunks: {}", e)))?;

        Ok((sources_count, chunks_count))
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;

        conn.execute_batch("DELETE FROM chunks; DELETE FROM sources;")
            .map_err(|e| AppError::Index(format!("Failed to reset index: {}", e)))?;

        tracing::info!("Reset vector index");
        Ok(())
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert bytes back to embedding vector. Trailing partial values are ignored.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(id: &str, path: &str, chunk_count: u32) -> SourceDocument {
        SourceDocument {
            id: id.to_string(),
            path: path.to_string(),
            content_hash: "hash".to_string(),
            ingested_at: Utc::now(),
            size_bytes: 100,
            chunk_count,
        }
    }

    fn chunk(id: &str, source_id: &str, position: u32, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            id: id.to_string(),
            source_id: source_id.to_string(),
            source_path: String::new(),
            position,
            start: 0,
            end: 9,
            text: format!("text of {}", id),
            embedding: Some(embedding),
        }
    }

    #[test]
    fn test_open_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/index.sqlite");
        SqliteIndex::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_insert_and_search() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .replace_source(
                &source("s1", "docs/a.md", 2),
                &[
                    chunk("c1", "s1", 0, vec![1.0, 0.0, 0.0]),
                    chunk("c2", "s1", 1, vec![0.0, 1.0, 0.0]),
                ],
            )
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "c1");
        assert_eq!(results[0].chunk.source_path, "docs/a.md");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].chunk.embedding.as_deref(), Some(&[1.0, 0.0, 0.0][..]));
    }

    #[test]
    fn test_replace_source_does_not_duplicate() {
        let index = SqliteIndex::in_memory().unwrap();
        let src = source("s1", "a.md", 2);
        let chunks = vec![
            chunk("c1", "s1", 0, vec![1.0, 0.0]),
            chunk("c2", "s1", 1, vec![0.0, 1.0]),
        ];

        index.replace_source(&src, &chunks).unwrap();
        index.replace_source(&src, &chunks).unwrap();
        assert_eq!(index.stats().unwrap(), (1, 2));

        // New version of the source with a single different chunk
        index
            .replace_source(&source("s1", "a.md", 1), &[chunk("c3", "s1", 0, vec![1.0, 1.0])])
            .unwrap();
        assert_eq!(index.stats().unwrap(), (1, 1));
        assert_eq!(index.get_source("s1").unwrap().unwrap().chunk_count, 1);
    }

    #[test]
    fn test_delete_source_cascades() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .replace_source(&source("s1", "a.md", 1), &[chunk("c1", "s1", 0, vec![1.0])])
            .unwrap();

        assert!(index.delete_source("s1").unwrap());
        assert!(!index.delete_source("s1").unwrap());
        assert_eq!(index.stats().unwrap(), (0, 0));
    }

    #[test]
    fn test_search_ties_ordered_by_id() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .replace_source(
                &source("s1", "a.md", 3),
                &[
                    chunk("zz", "s1", 0, vec![1.0, 0.0]),
                    chunk("aa", "s1", 1, vec![1.0, 0.0]),
                    chunk("mm", "s1", 2, vec![1.0, 0.0]),
                ],
            )
            .unwrap();

        let ids: Vec<String> = index
            .search(&[1.0, 0.0], 2)
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, vec!["aa", "mm"]);
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .replace_source(&source("s1", "a.md", 1), &[chunk("c1", "s1", 0, vec![1.0, 0.0, 0.0])])
            .unwrap();

        let result = index.search(&[1.0, 0.0], 5);
        assert!(matches!(result, Err(AppError::Retrieval(_))));
    }

    #[test]
    fn test_search_empty_index() {
        let index = SqliteIndex::in_memory().unwrap();
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_list_sources_and_reset() {
        let index = SqliteIndex::in_memory().unwrap();
        index.replace_source(&source("s2", "b.md", 0), &[]).unwrap();
        index.replace_source(&source("s1", "a.md", 0), &[]).unwrap();

        let paths: Vec<String> = index.list_sources().unwrap().into_iter().map(|s| s.path).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);

        index.reset().unwrap();
        assert!(index.list_sources().unwrap().is_empty());
    }

    #[test]
    fn test_missing_embedding_rejected() {
        let index = SqliteIndex::in_memory().unwrap();
        let mut c = chunk("c1", "s1", 0, vec![1.0]);
        c.embedding = None;
        assert!(index.replace_source(&source("s1", "a.md", 1), &[c]).is_err());
        // Transaction rolled back
        assert_eq!(index.stats().unwrap(), (0, 0));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
