//! Index maintenance commands: stats, clean, health.

use super::print_json;
use clap::Args;
use std::process::ExitCode;
use wikiqa_core::{config::AppConfig, AppResult};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<ExitCode> {
        tracing::info!("Executing stats command");

        let stats = wikiqa_rag::stats(&config.workspace)?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!("Sources:    {}", stats.sources_count);
            println!("Chunks:     {}", stats.chunks_count);
            println!("Index size: {} bytes", stats.db_size_bytes);
            if let (Some(provider), Some(model), Some(dim)) = (
                &stats.embedding_provider,
                &stats.embedding_model,
                stats.embedding_dim,
            ) {
                println!("Embeddings: {} / {} ({} dims)", provider, model, dim);
            }
            if let Some(at) = stats.last_ingest_at {
                println!("Last ingest: {}", at.to_rfc3339());
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

/// Remove everything from the index
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<ExitCode> {
        tracing::info!("Executing clean command");

        wikiqa_rag::clean(&config.workspace)?;
        println!("Index cleaned");

        Ok(ExitCode::SUCCESS)
    }
}

/// Check the index and backends
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<ExitCode> {
        tracing::info!("Executing health command");

        let report = wikiqa_rag::check_health(config).await;

        if self.json {
            print_json(&report)?;
        } else {
            println!("Status: {:?}", report.status);
            for (service, status) in &report.services {
                println!("  {:<11} {}", service, status);
            }
        }

        Ok(if report.is_healthy() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}
