//! Iris CLI - caption reranking and segmentation overlays.
//!
//! Iris picks the best of several generated captions for an image and draws
//! the confidently detected object instances onto an annotated copy.
//!
//! # Usage
//!
//! ```bash
//! # Caption and segment an image, report to stdout
//! iris analyze street.jpg
//!
//! # Save the overlay and write the report as JSON Lines
//! iris analyze street.jpg --overlay annotated.png -o report.jsonl --format jsonl
//!
//! # Stricter threshold, repeatable random colors
//! iris analyze street.jpg -t 0.85 --colors random --seed 7 --overlay
//!
//! # View configuration
//! iris config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Iris - caption reranking and segmentation overlays.
#[derive(Parser, Debug)]
#[command(name = "iris")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Caption an image and render its segmentation overlay
    Analyze(cli::analyze::AnalyzeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't up yet, so config warnings go straight to stderr.
    let config = match iris_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `iris config path`."
            );
            iris_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Iris v{}", iris_core::VERSION);

    match cli.command {
        Commands::Analyze(args) => cli::analyze::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
