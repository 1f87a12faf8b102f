//! Ask command handler.

use super::print_json;
use clap::Args;
use std::process::ExitCode;
use wikiqa_core::{config::AppConfig, AppResult};
use wikiqa_rag::{AskOptions, PipelineOutcome, RagPipeline};

/// Exit status for a query rejected by the injection guard.
const BLOCKED_EXIT_CODE: u8 = 2;

/// Ask a question about the indexed documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question
    pub query: String,

    /// Number of chunks to answer from (1-20; default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Rerank a wider candidate set before answering
    #[arg(long)]
    pub rerank: bool,

    /// Skip the injection guard and PII scrubber
    #[arg(long)]
    pub unguarded: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<ExitCode> {
        tracing::info!("Executing ask command");

        let options = AskOptions::new(self.query.clone())
            .with_top_k(self.top_k.unwrap_or(config.rag.top_k as usize))
            .with_rerank(self.rerank)
            .with_guard(!self.unguarded);

        let pipeline = RagPipeline::from_app_config(config).await?;
        let outcome = pipeline.ask(options).await?;

        if self.json {
            print_json(&outcome)?;
        }

        let status = exit_status(&outcome);

        match outcome {
            PipelineOutcome::Answered(response) => {
                if !self.json {
                    println!("{}", response.answer);
                    println!();

                    if response.citations.is_empty() {
                        println!("Sources: (none)");
                    } else {
                        println!("Sources:");
                        for citation in &response.citations {
                            println!("- {} ({:.3})", citation.document, citation.score);
                        }
                    }

                    if response.metadata.was_scrubbed {
                        println!();
                        println!("Redacted: {}", response.metadata.pii_detected.join(", "));
                    }
                }
            }
            PipelineOutcome::Blocked(blocked) => {
                if !self.json {
                    eprintln!("Query blocked: {}", blocked.reason);
                    for pattern in &blocked.detected_patterns {
                        eprintln!("- matched {}", pattern);
                    }
                }
            }
        }

        Ok(ExitCode::from(status))
    }
}

/// Process exit status for a pipeline outcome.
fn exit_status(outcome: &PipelineOutcome) -> u8 {
    match outcome {
        PipelineOutcome::Answered(_) => 0,
        PipelineOutcome::Blocked(_) => BLOCKED_EXIT_CODE,
    }
}
