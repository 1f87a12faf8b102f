//! Eval command handler.

use super::print_json;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use wikiqa_core::{config::AppConfig, AppResult};
use wikiqa_rag::eval::{append_run, evaluate, load_golden_set};
use wikiqa_rag::{EvalOptions, RagPipeline};

/// Measure retrieval quality against a golden set
#[derive(Args, Debug)]
pub struct EvalCommand {
    /// Golden set JSON file: [{"question": ..., "document": ...}]
    pub golden_set: PathBuf,

    /// Number of chunks retrieved per question
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Evaluate only the first N questions
    #[arg(short = 'n', long)]
    pub sample_size: Option<usize>,

    /// Rerank candidates before scoring
    #[arg(long)]
    pub rerank: bool,

    /// Do not append the run to .wikiqa/eval/runs.jsonl
    #[arg(long)]
    pub no_record: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl EvalCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<ExitCode> {
        tracing::info!("Executing eval command with {:?}", self.golden_set);

        let items = load_golden_set(&self.golden_set)?;
        let pipeline = RagPipeline::from_app_config(config).await?;

        let options = EvalOptions {
            top_k: self.top_k,
            use_rerank: self.rerank,
            sample_size: self.sample_size,
        };

        let report = evaluate(
            pipeline.retriever(),
            pipeline.reranker().map(|r| r.as_ref()),
            pipeline.rerank_candidates(),
            &items,
            &options,
        )
        .await?;

        if !self.no_record {
            append_run(&config.workspace, &report)?;
        }

        if self.json {
            print_json(&report)?;
        } else {
            println!("Samples:     {}", report.total_samples);
            println!("Top-k:       {}", report.top_k);
            println!("Reranked:    {}", report.use_rerank);
            println!("Recall@3:    {:.3}", report.recall_at_3);
            println!("Recall@5:    {:.3}", report.recall_at_5);
            println!("MRR:         {:.3}", report.mrr);
            println!("Avg latency: {:.1}ms", report.avg_latency_ms);
        }

        Ok(ExitCode::SUCCESS)
    }
}
