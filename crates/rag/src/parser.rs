//! Source file reading.
//!
//! Documents are indexed as written: chunk byte offsets point into the text
//! returned here, so no markup is stripped.

use std::fs;
use std::path::Path;
use wikiqa_core::{AppError, AppResult};

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    PlainText,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unsupported,
        }
    }
}

/// Read a source file as UTF-8 text.
///
/// A leading byte-order mark is dropped. Files containing NUL bytes are
/// rejected as binary.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Index(format!("Failed to read {:?}: {}", path, e)))?;

    if raw.contains('\0') {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Index(format!(
            "Binary file not supported: {:?}",
            path
        )));
    }

    Ok(raw.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(raw))
}
