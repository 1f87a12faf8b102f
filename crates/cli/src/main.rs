//! wikiqa CLI
//!
//! Main entry point for the wikiqa command-line tool: ingest a document
//! wiki, then ask grounded questions about it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, CleanCommand, EvalCommand, HealthCommand, IngestCommand, StatsCommand};
use std::path::PathBuf;
use std::process::ExitCode;
use wikiqa_core::{config::AppConfig, logging, AppResult};

/// wikiqa - grounded question answering over a document wiki
#[derive(Parser, Debug)]
#[command(name = "wikiqa")]
#[command(about = "Grounded question answering over a document wiki", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "WIKIQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.wikiqa/config.yaml)
    #[arg(short, long, global = true, env = "WIKIQA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM backend (lm-studio, ollama, openai)
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// LLM backend base URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index documents into the workspace
    Ingest(IngestCommand),

    /// Ask a question about the indexed documents
    Ask(AskCommand),

    /// Measure retrieval quality against a golden set
    Eval(EvalCommand),

    /// Show index statistics
    Stats(StatsCommand),

    /// Remove everything from the index
    Clean(CleanCommand),

    /// Check the index and backends
    Health(HealthCommand),
}

#[tokio::main]
async fn main() -> AppResult<ExitCode> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, config file, environment, then CLI flags
    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        cli.backend,
        cli.model,
        cli.endpoint,
        cli.log_level,
        cli.log_format,
        cli.verbose,
        cli.no_color,
    );

    let log_format: logging::LogFormat = config.log_format.parse()?;
    logging::init_logging(config.log_level.as_deref(), config.no_color, log_format)?;

    config.validate()?;

    tracing::info!("wikiqa starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Backend: {}", config.backend);

    config.ensure_wikiqa_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Eval(_) => "eval",
        Commands::Stats(_) => "stats",
        Commands::Clean(_) => "clean",
        Commands::Health(_) => "health",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Eval(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config),
        Commands::Clean(cmd) => cmd.execute(&config),
        Commands::Health(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
