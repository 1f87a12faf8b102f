//! Question-answering pipeline.
//!
//! Stages run in order over one [`QueryContext`]:
//! guard → retrieve → rerank (optional) → generate → scrub.
//! The guard may stop the run before retrieval; that is reported as
//! [`PipelineOutcome::Blocked`], not as an error.

use crate::config;
use crate::embeddings::create_provider;
use crate::generation::Generator;
use crate::index::SqliteIndex;
use crate::rerank::{create_reranker, rerank, Reranker};
use crate::retrieval::Retriever;
use crate::safety::{GuardVerdict, InjectionGuard, PiiScrubber, RiskLevel, ScrubResult};
use crate::types::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use wikiqa_core::{AppConfig, AppError, AppResult};
use wikiqa_llm::{create_client, resolve_model};
use wikiqa_prompt::load_prompt;

/// Longest accepted query, in characters after trimming.
pub const MAX_QUERY_CHARS: usize = 500;

/// Largest accepted `top_k`.
pub const MAX_TOP_K: usize = 20;

const CITATION_PREVIEW_CHARS: usize = 200;

/// Options for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskOptions {
    pub query: String,
    pub top_k: usize,
    pub use_rerank: bool,

    /// Run the injection guard and PII scrubber
    pub guarded: bool,
}

impl AskOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: 5,
            use_rerank: false,
            guarded: true,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_rerank(mut self, use_rerank: bool) -> Self {
        self.use_rerank = use_rerank;
        self
    }

    pub fn with_guard(mut self, guarded: bool) -> Self {
        self.guarded = guarded;
        self
    }

    /// Check query length and `top_k` bounds.
    pub fn validate(&self) -> AppResult<()> {
        let len = self.query.trim().chars().count();
        if len == 0 {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }
        if len > MAX_QUERY_CHARS {
            return Err(AppError::InvalidInput(format!(
                "Query is {} characters, maximum is {}",
                len, MAX_QUERY_CHARS
            )));
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(AppError::InvalidInput(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_TOP_K, self.top_k
            )));
        }
        Ok(())
    }
}

/// Wall-clock time spent in each stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard_ms: Option<f64>,
    pub retrieval_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_ms: Option<f64>,
    pub generation_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrub_ms: Option<f64>,
    pub total_ms: f64,
}

/// State for a single pipeline run. Dropped once the response is built.
#[derive(Debug)]
pub struct QueryContext {
    pub request_id: String,
    pub options: AskOptions,
    pub verdict: Option<GuardVerdict>,
    pub retrieved: Vec<ScoredChunk>,
    pub reranked: Option<Vec<ScoredChunk>>,
    pub answer: Option<String>,
    pub scrub: Option<ScrubResult>,
    pub timings: StageTimings,
}

impl QueryContext {
    pub fn new(options: AskOptions) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            options,
            verdict: None,
            retrieved: Vec::new(),
            reranked: None,
            answer: None,
            scrub: None,
            timings: StageTimings::default(),
        }
    }

    /// Chunks handed to the generator: reranked if reranking ran.
    pub fn context_chunks(&self) -> &[ScoredChunk] {
        self.reranked.as_deref().unwrap_or(&self.retrieved)
    }
}

/// A chunk cited in an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// File name of the source document
    pub document: String,
    pub chunk_id: String,

    /// First 200 characters of the chunk, followed by "..."
    pub text: String,

    /// Rerank score if the chunk was reranked, else similarity
    pub score: f32,
}

impl Citation {
    pub fn from_chunk(scored: &ScoredChunk) -> Self {
        let preview: String = scored.chunk.text.chars().take(CITATION_PREVIEW_CHARS).collect();
        Self {
            document: scored.chunk.document_name().to_string(),
            chunk_id: scored.chunk.id.clone(),
            text: format!("{}...", preview),
            score: scored.effective_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: String,
    pub query: String,
    pub top_k: usize,
    pub use_rerank: bool,
    pub reranked: bool,
    pub guarded: bool,
    pub llm_backend: String,
    pub model: String,
    pub chunks_retrieved: usize,
    pub pii_detected: Vec<String>,
    pub was_scrubbed: bool,
    pub timings_ms: StageTimings,
}

/// A generated answer with its citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub metadata: ResponseMetadata,
}

/// Returned instead of an answer when the guard rejects the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedResponse {
    pub request_id: String,
    pub reason: String,
    pub detected_patterns: Vec<String>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PipelineOutcome {
    Answered(AskResponse),
    Blocked(BlockedResponse),
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// The assembled pipeline. Immutable after construction; share it with `Arc`.
pub struct RagPipeline {
    guard: InjectionGuard,
    retriever: Retriever,
    reranker: Option<Arc<dyn Reranker>>,
    rerank_candidates: usize,
    generator: Generator,
    scrubber: PiiScrubber,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, generator: Generator) -> Self {
        Self {
            guard: InjectionGuard::new(),
            retriever,
            reranker: None,
            rerank_candidates: 20,
            generator,
            scrubber: PiiScrubber::new(),
        }
    }

    pub fn with_reranker(mut self, reranker: Option<Arc<dyn Reranker>>) -> Self {
        self.reranker = reranker;
        self
    }

    /// Number of candidates retrieved before reranking.
    pub fn with_rerank_candidates(mut self, rerank_candidates: usize) -> Self {
        self.rerank_candidates = rerank_candidates;
        self
    }

    /// Assemble the pipeline for a workspace.
    ///
    /// Queries are embedded with the provider recorded in the index config,
    /// so the workspace must have been ingested first.
    pub async fn from_app_config(app: &AppConfig) -> AppResult<Self> {
        let workspace = &app.workspace;
        let index_path = config::get_index_path(workspace);
        let index_config = match config::load_index_config(workspace)? {
            Some(cfg) if index_path.exists() => cfg,
            _ => {
                return Err(AppError::Index(format!(
                    "No index found in {:?}. Run 'wikiqa ingest' first.",
                    workspace
                )))
            }
        };

        let embedder = create_provider(&index_config.embedding).await?;
        let index = Arc::new(SqliteIndex::open(&index_path)?);
        let retriever = Retriever::new(index, embedder).with_min_score(app.rag.min_score);

        let api_key = app.resolve_api_key();
        let client = create_client(&app.backend, app.endpoint.as_deref(), api_key.as_deref())?;
        let model = resolve_model(&app.backend, app.model.as_deref());
        let prompt = load_prompt(workspace, &app.rag.prompt_id)?;
        let generator = Generator::new(client, model, prompt)
            .with_temperature(app.rag.temperature)
            .with_max_tokens(app.rag.max_tokens);

        tracing::debug!(
            "Pipeline ready (backend: {}, embeddings: {}, reranker: {})",
            app.backend,
            index_config.embedding.provider,
            app.rag.reranker
        );

        Ok(Self::new(retriever, generator)
            .with_reranker(create_reranker(&app.rag)?)
            .with_rerank_candidates(app.rag.rerank_candidates as usize))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn reranker(&self) -> Option<&Arc<dyn Reranker>> {
        self.reranker.as_ref()
    }

    pub fn rerank_candidates(&self) -> usize {
        self.rerank_candidates
    }

    /// Answer one question.
    pub async fn ask(&self, options: AskOptions) -> AppResult<PipelineOutcome> {
        options.validate()?;

        let ctx = QueryContext::new(options);
        let span = tracing::info_span!("ask", request_id = %ctx.request_id);
        self.run(ctx).instrument(span).await
    }

    async fn run(&self, mut ctx: QueryContext) -> AppResult<PipelineOutcome> {
        let total = Instant::now();
        tracing::info!(
            top_k = ctx.options.top_k,
            use_rerank = ctx.options.use_rerank,
            guarded = ctx.options.guarded,
            "Received query"
        );

        if ctx.options.guarded {
            let start = Instant::now();
            let verdict = self.guard.check(&ctx.options.query);
            ctx.timings.guard_ms = Some(elapsed_ms(start));

            if !verdict.is_safe {
                tracing::info!("Query blocked before retrieval");
                return Ok(PipelineOutcome::Blocked(BlockedResponse {
                    request_id: ctx.request_id,
                    reason: "Potential prompt injection detected".to_string(),
                    detected_patterns: verdict.detected_patterns,
                    risk_level: verdict.risk_level,
                }));
            }
            ctx.verdict = Some(verdict);
        }

        let reranker = if ctx.options.use_rerank {
            if self.reranker.is_none() {
                tracing::warn!("Reranking requested but no reranker is configured");
            }
            self.reranker.as_ref()
        } else {
            None
        };

        let top_k = ctx.options.top_k;
        let fetch_k = match reranker {
            Some(_) => self.rerank_candidates.max(top_k),
            None => top_k,
        };

        let start = Instant::now();
        ctx.retrieved = self.retriever.retrieve(&ctx.options.query, fetch_k).await?;
        ctx.timings.retrieval_ms = elapsed_ms(start);
        tracing::info!("Retrieved {} chunks", ctx.retrieved.len());

        if let Some(reranker) = reranker {
            let start = Instant::now();
            let candidates = ctx.retrieved.clone();
            let reranked = rerank(reranker.as_ref(), &ctx.options.query, candidates, top_k).await;
            ctx.timings.rerank_ms = Some(elapsed_ms(start));
            tracing::info!("Reranked to {} chunks", reranked.len());
            ctx.reranked = Some(reranked);
        }

        let start = Instant::now();
        let answer = self
            .generator
            .generate(&ctx.options.query, ctx.context_chunks())
            .await?;
        ctx.timings.generation_ms = elapsed_ms(start);
        tracing::info!("Generated answer");

        let answer = if ctx.options.guarded {
            let start = Instant::now();
            let scrub = self.scrubber.scrub(&answer);
            ctx.timings.scrub_ms = Some(elapsed_ms(start));
            let text = scrub.text.clone();
            ctx.scrub = Some(scrub);
            text
        } else {
            answer
        };
        ctx.answer = Some(answer);
        ctx.timings.total_ms = elapsed_ms(total);

        tracing::info!("Completed in {:.1}ms", ctx.timings.total_ms);
        Ok(PipelineOutcome::Answered(self.respond(ctx)))
    }

    fn respond(&self, ctx: QueryContext) -> AskResponse {
        let citations: Vec<Citation> = ctx.context_chunks().iter().map(Citation::from_chunk).collect();
        let (pii_detected, was_scrubbed) = ctx
            .scrub
            .map(|s| (s.pii_detected, s.was_scrubbed))
            .unwrap_or_default();

        AskResponse {
            answer: ctx.answer.unwrap_or_default(),
            metadata: ResponseMetadata {
                request_id: ctx.request_id,
                query: ctx.options.query,
                top_k: ctx.options.top_k,
                use_rerank: ctx.options.use_rerank,
                reranked: ctx.reranked.is_some(),
                guarded: ctx.options.guarded,
                llm_backend: self.generator.backend().to_string(),
                model: self.generator.model().to_string(),
                chunks_retrieved: citations.len(),
                pii_detected,
                was_scrubbed,
                timings_ms: ctx.timings,
            },
            citations,
        }
    }
}
