//! Cross-module scenarios: ingestion through retrieval, and the full
//! pipeline with mocked backends.

mod pipeline_safety;
