//! VetCompass - clinical coding from the command line
//!
//! Main entry point for the vetcompass CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{search, select, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// VetCompass - search VeNom codes for veterinary case records
#[derive(Parser)]
#[command(name = "vetcompass")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to client.toml (default: <config dir>/vetcompass/client.toml)
    #[arg(long, global = true, env = "VETCOMPASS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a coding session and print its id
    Start(start::StartArgs),

    /// Search for codes
    Search(search::SearchArgs),

    /// Record the code chosen for a search
    Select(select::SelectArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "vetcompass=debug,vetcompass_client=debug,vetcompass_config=debug,info"
    } else {
        "vetcompass=info,vetcompass_client=warn,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Search(args) => search::run(args, &ctx).await,
        Commands::Select(args) => select::run(args, &ctx).await,
    }
}
