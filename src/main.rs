//! # lexrag CLI
//!
//! ## Usage
//!
//! ```bash
//! lexrag --config ./config/lexrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexrag serve` | Start the HTTP API |
//! | `lexrag chunk <file>` | Show how a file would be split into windows |
//! | `lexrag search "<query>" --file <path>... [--scoring length_normalized]` | Rank chunks from local files |
//! | `lexrag ask "<question>" --file <path>...` | Answer a question from local files |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lexrag::{commands, config, server};
use lexrag_core::score::ScoringPolicy;

/// lexrag: lexical retrieval-augmented question answering.
#[derive(Parser)]
#[command(name = "lexrag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lexrag.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/lexrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind`, loads `[ingest].sample_document` if set,
    /// and serves `/health`, `/ingest`, `/query` and `/search`.
    Serve,

    /// Print the chunk windows for a file.
    Chunk {
        file: PathBuf,

        /// Window length in characters (defaults to `[chunking].chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive windows.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Rank chunks from local files against a query.
    Search {
        query: String,

        /// Files to index; repeat for several.
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        top_k: Option<usize>,

        /// `raw` or `length_normalized` (defaults to `[retrieval].scoring`).
        #[arg(long)]
        scoring: Option<ScoringPolicy>,
    },

    /// Answer a question using local files as context.
    Ask {
        question: String,

        /// Files to index; repeat for several.
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        top_k: Option<usize>,

        /// Sampling temperature in [0.0, 1.0].
        #[arg(long, default_value_t = 0.3)]
        temperature: f64,

        /// `raw` or `length_normalized` (defaults to `[retrieval].scoring`).
        #[arg(long)]
        scoring: Option<ScoringPolicy>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Chunk {
            file,
            chunk_size,
            overlap,
        } => {
            commands::run_chunk(&cfg, &file, chunk_size, overlap)?;
        }
        Commands::Search {
            query,
            files,
            top_k,
            scoring,
        } => {
            commands::run_search(&cfg, &query, &files, top_k, scoring)?;
        }
        Commands::Ask {
            question,
            files,
            top_k,
            temperature,
            scoring,
        } => {
            commands::run_ask(&cfg, &question, &files, top_k, temperature, scoring).await?;
        }
    }

    Ok(())
}
