//! Ingest command handler.

use super::print_json;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use wikiqa_core::{config::AppConfig, AppResult};
use wikiqa_rag::IngestOptions;

/// Index documents into the workspace
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory or file to ingest (relative paths resolve against the workspace)
    #[arg(default_value = "docs")]
    pub path: PathBuf,

    /// Re-index unchanged files and replace an index built with other embedding settings
    #[arg(long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<ExitCode> {
        tracing::info!("Executing ingest command for {:?}", self.path);

        let path = if self.path.is_absolute() {
            self.path.clone()
        } else {
            config.workspace.join(&self.path)
        };

        let stats = wikiqa_rag::ingest(
            config,
            &IngestOptions {
                path,
                force: self.force,
            },
        )
        .await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Indexed {} sources ({} unchanged, {} removed): {} chunks, {} bytes in {:.2}s",
                stats.sources_indexed,
                stats.sources_unchanged,
                stats.sources_removed,
                stats.chunks_count,
                stats.bytes_processed,
                stats.duration_secs
            );
        }

        Ok(ExitCode::SUCCESS)
    }
}
