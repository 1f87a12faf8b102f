//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};
use wikiqa_core::{AppError, AppResult};

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Source identifier for a workspace-relative path.
pub fn source_id_for(path: &str) -> String {
    sha256_hex(path.as_bytes())
}

/// Stable chunk identifier from its source, position and text.
pub fn chunk_id_for(source_id: &str, position: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(b":");
    hasher.update(position.to_le_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Splits on the largest semantic unit that fits (paragraph, line,
/// sentence, word). Offsets are byte offsets into `text`; whitespace-only
/// chunks are dropped.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<ChunkCandidate>> {
    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Config(format!("Invalid chunk settings: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkCandidate> = splitter
        .chunk_indices(text)
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .enumerate()
        .map(|(position, (start, chunk))| {
            let position = position as u32;
            ChunkCandidate {
                id: chunk_id_for(source_id, position, chunk),
                source_id: source_id.to_string(),
                position,
                start,
                end: start + chunk.len(),
                text: chunk.to_string(),
            }
        })
        .collect();

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(i: usize) -> String {
        format!("Paragraph {} talks about topic number {} in some detail.", i, i)
    }

    #[test]
    fn test_chunk_text_basic() {
        let text = (0..40).map(paragraph).collect::<Vec<_>>().join("\n\n");
        let chunks = chunk_text("source", &text, 200, 20).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, i as u32);
            assert!(chunk.text.chars().count() <= 200);
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_chunk_text_small_document_single_chunk() {
        let chunks = chunk_text("source", "Just one short line.", 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].text, "Just one short line.");
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("source", "", 100, 10).unwrap().is_empty());
        assert!(chunk_text("source", " \n\n ", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(chunk_text("source", "some text", 50, 50).is_err());
    }

    #[test]
    fn test_chunk_text_utf8() {
        let text = "Zürich liegt am Zürichsee. Ça va très bien. 東京は大きい。 ".repeat(40);
        let chunks = chunk_text("source", &text, 120, 10).unwrap();

        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(text.is_char_boundary(chunk.start));
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_ids_are_stable_and_distinct() {
        let text = (0..20).map(paragraph).collect::<Vec<_>>().join("\n\n");
        let first = chunk_text("source", &text, 150, 0).unwrap();
        let second = chunk_text("source", &text, 150, 0).unwrap();

        assert_eq!(first, second);
        let mut ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), first.len());

        let other = chunk_text("other-source", &text, 150, 0).unwrap();
        assert_ne!(first[0].id, other[0].id);
    }

    #[test]
    fn test_source_id_is_sha256() {
        assert_eq!(source_id_for("a.md").len(), 64);
        assert_eq!(source_id_for("a.md"), source_id_for("a.md"));
        assert_ne!(source_id_for("a.md"), source_id_for("b.md"));
    }
}
