//! PII scrubber for generated answers.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Patterns in application order. Card and SSN numbers go before phone
/// numbers so their digit runs are never half-redacted as phones.
const PII_PATTERNS: &[(&str, &str, &str)] = &[
    (
        "credit_card",
        r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
        "[CC_REDACTED]",
    ),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "[SSN_REDACTED]"),
    (
        "email",
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        "[EMAIL_REDACTED]",
    ),
    (
        "phone",
        r"\b(?:\+?1[-.]?)?\(?([0-9]{3})\)?[-.]?([0-9]{3})[-.]?([0-9]{4})\b",
        "[PHONE_REDACTED]",
    ),
];

/// Result of scrubbing a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrubResult {
    /// Text with every detected item replaced by its placeholder
    pub text: String,

    /// Kinds found, in application order (`credit_card`, `ssn`, `email`, `phone`)
    pub pii_detected: Vec<String>,

    pub was_scrubbed: bool,
}

struct PiiPattern {
    kind: &'static str,
    regex: Regex,
    placeholder: &'static str,
}

/// Regex-based redactor for emails, phone numbers, SSNs and card numbers.
pub struct PiiScrubber {
    patterns: Vec<PiiPattern>,
}

impl PiiScrubber {
    pub fn new() -> Self {
        let patterns = PII_PATTERNS
            .iter()
            .filter_map(|&(kind, pattern, placeholder)| match Regex::new(pattern) {
                Ok(regex) => Some(PiiPattern {
                    kind,
                    regex,
                    placeholder,
                }),
                Err(e) => {
                    tracing::warn!("Failed to compile PII pattern '{}': {}", kind, e);
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    /// Replace every detected item with its placeholder. Text without PII
    /// is returned unchanged.
    pub fn scrub(&self, text: &str) -> ScrubResult {
        let mut scrubbed = text.to_string();
        let mut pii_detected = Vec::new();

        for pattern in &self.patterns {
            if pattern.regex.is_match(&scrubbed) {
                scrubbed = pattern
                    .regex
                    .replace_all(&scrubbed, pattern.placeholder)
                    .into_owned();
                pii_detected.push(pattern.kind.to_string());
            }
        }

        let was_scrubbed = !pii_detected.is_empty();
        if was_scrubbed {
            tracing::warn!(kinds = ?pii_detected, "PII detected and scrubbed");
        }

        ScrubResult {
            text: scrubbed,
            pii_detected,
            was_scrubbed,
        }
    }

    /// Kinds of PII present in `text`, without modifying it.
    pub fn detect(&self, text: &str) -> Vec<&'static str> {
        self.patterns
            .iter()
            .filter(|p| p.regex.is_match(text))
            .map(|p| p.kind)
            .collect()
    }
}

impl Default for PiiScrubber {
    fn default() -> Self {
        Self::new()
    }
}
