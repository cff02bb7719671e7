//! # hirag CLI
//!
//! The `hirag` binary manages the document cache: building and rebuilding
//! staged artifacts, inspecting store state, clearing caches, compacting
//! storage, and running similarity search.
//!
//! ## Usage
//!
//! ```bash
//! hirag --config ./hirag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hirag build <source>` | Register a source and build its cache (no-op when valid) |
//! | `hirag rebuild [id]` | Invalidate and rebuild one document, or all |
//! | `hirag info` | Aggregate statistics across all three stores |
//! | `hirag list` | Registered documents with stage flags |
//! | `hirag inspect <id>` | Everything known about one document |
//! | `hirag clear [id]` | Purge cached artifacts, keep registrations |
//! | `hirag vacuum` | Compact metadata, sweep orphaned artifacts |
//! | `hirag search <id> "<query>"` | Similarity search over one document |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hirag::{config, pipeline, search, status, vacuum};

/// Cache and storage manager for hierarchical retrieval over structured
/// legal documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file naming the storage root and the embedding provider.
#[derive(Parser)]
#[command(
    name = "hirag",
    about = "Cache and storage manager for hierarchical document retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./hirag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Register a source document and build its cache.
    ///
    /// Runs the staged pipeline (parse, index, embed). A document whose
    /// cache is already complete and whose source is unchanged is a no-op.
    Build {
        /// Path to the source document (.docx, .txt, or .md).
        source: PathBuf,

        /// Display name; defaults to the source file stem.
        #[arg(long)]
        name: Option<String>,
    },

    /// Invalidate and rebuild one document, or every document.
    Rebuild {
        /// Document id. Omit to rebuild all registered documents.
        doc_id: Option<i64>,
    },

    /// Show aggregate statistics across the three stores.
    Info,

    /// List registered documents and their stage flags.
    List,

    /// Show everything known about one document.
    Inspect {
        /// Document id.
        doc_id: i64,
    },

    /// Purge cached artifacts. Documents stay registered.
    Clear {
        /// Document id. Omit to clear every document's cache.
        doc_id: Option<i64>,
    },

    /// Compact the metadata database and sweep orphaned artifacts.
    Vacuum,

    /// Similarity search over one document's clauses.
    ///
    /// Requires a complete cache and a configured embedding provider.
    Search {
        /// Document id.
        doc_id: i64,

        /// The query string.
        query: String,

        /// Maximum number of results; defaults to `retrieval.top_k`.
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { source, name } => {
            pipeline::run_build(&cfg, &source, name.as_deref()).await?;
        }
        Commands::Rebuild { doc_id } => {
            pipeline::run_rebuild(&cfg, doc_id).await?;
        }
        Commands::Info => {
            status::run_info(&cfg).await?;
        }
        Commands::List => {
            status::run_list(&cfg).await?;
        }
        Commands::Inspect { doc_id } => {
            status::run_inspect(&cfg, doc_id).await?;
        }
        Commands::Clear { doc_id } => {
            pipeline::run_clear(&cfg, doc_id).await?;
        }
        Commands::Vacuum => {
            vacuum::run_vacuum(&cfg).await?;
        }
        Commands::Search {
            doc_id,
            query,
            top_k,
        } => {
            search::run_search(&cfg, doc_id, &query, top_k).await?;
        }
    }

    Ok(())
}
