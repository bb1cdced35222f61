//! # docqa CLI
//!
//! The `docqa` binary imports passages, builds embeddings, answers
//! questions, and serves the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa import <file>` | Import chunked passages from a JSON file |
//! | `docqa embed pending` | Embed passages missing a current vector |
//! | `docqa embed rebuild` | Delete and regenerate all embeddings |
//! | `docqa ask "<question>"` | Answer one question |
//! | `docqa compare "<q1>" "<q2>"` | Run questions through both modes side by side |
//! | `docqa stats` | Corpus and embedding coverage |
//! | `docqa serve` | Start the HTTP server |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::{ask, config, embed_cmd, import, migrate, server, stats};

/// Cited question answering over technical documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Cited question answering over technical documents",
    version,
    long_about = "docqa answers questions from a fixed corpus of document passages. \
    Baseline mode trusts semantic similarity; hybrid mode re-ranks a wider semantic pool \
    with BM25. Answers are extracted sentences with numbered sources, or an abstention \
    with a reason when retrieval confidence is too low."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the file does not exist, built-in defaults are used and the
    /// database lives at `./data/docqa.sqlite`.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Import passages from a JSON array.
    ///
    /// Each record has `source_file`, `title`, `text`, `chunk_index`, and
    /// an optional `url`. Re-importing a record with the same source file
    /// and chunk index replaces it.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Answer a question.
    Ask {
        /// The question.
        query: String,

        /// Retrieval mode: `baseline` or `hybrid`.
        #[arg(long, default_value = "baseline")]
        mode: String,

        /// Number of contexts to return (clamped to 1..=50).
        #[arg(long)]
        k: Option<i64>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run each question through baseline and hybrid and compare.
    Compare {
        /// One or more questions.
        #[arg(required = true)]
        queries: Vec<String>,

        /// Number of contexts to retrieve per mode.
        #[arg(long)]
        k: Option<i64>,
    },

    /// Show corpus statistics.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed passages that are missing or have stale embeddings.
    Pending {
        /// Maximum number of passages to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete and regenerate all embeddings.
    Rebuild {
        /// Override the batch size from config.
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
        config::Config::minimal()
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
            EmbedAction::Rebuild { batch_size } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size).await?;
            }
        },
        Commands::Ask {
            query,
            mode,
            k,
            json,
        } => {
            ask::run_ask(&cfg, &query, &mode, k, json).await?;
        }
        Commands::Compare { queries, k } => {
            ask::run_compare(&cfg, &queries, k).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
