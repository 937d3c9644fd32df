//! # Merchant Insights CLI (`insights`)
//!
//! ## Usage
//!
//! ```bash
//! insights --config ./config/insights.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `insights sources` | List configured sources and their shape |
//! | `insights chunks` | Print normalized chunks (no provider calls) |
//! | `insights retrieve "<query>"` | Build the index and print the nearest chunks |
//! | `insights ask "<question>"` | Build the index and print a synthesized answer |
//! | `insights serve` | Build the index, then start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`.

use clap::{Parser, Subcommand};
use merchant_insights::{commands, config, server, sources};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Merchant Insights: ask questions about merchant payment data.
#[derive(Parser)]
#[command(
    name = "insights",
    about = "Merchant Insights: retrieval-augmented answers over merchant payment CSVs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/insights.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured sources with row and column counts.
    Sources,

    /// Print normalized chunks without contacting the provider.
    Chunks {
        /// Show at most this many chunks.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the chunks nearest to a query, nearest first.
    Retrieve {
        query: String,

        /// Number of chunks (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question from retrieved context.
    Ask {
        question: String,

        /// Number of context chunks (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Build the index, then serve HTTP on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("merchant_insights=info,merchant_insights_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Chunks { limit } => {
            commands::run_chunks(&cfg, limit)?;
        }
        Commands::Retrieve { query, k } => {
            commands::run_retrieve(&cfg, &query, k).await?;
        }
        Commands::Ask { question, k } => {
            commands::run_ask(&cfg, &question, k).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
