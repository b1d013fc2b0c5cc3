//! Plantitas Cache CLI - maintenance tool for the response cache database.
//!
//! Inspects, seeds and sweeps the same SQLite file the assistant backend
//! writes to. Safe to run while the backend is live.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plantitas_cache::{CacheDefaults, CachePolicy, CachePolicyConfig, SqliteCacheStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "plantitas-cache")]
#[command(about = "Maintenance tool for the Plantitas response cache")]
struct Args {
    /// Cache database file (defaults to the platform data directory)
    #[arg(long, env = "PLANTITAS_CACHE_DB")]
    db: Option<PathBuf>,

    /// JSON file with the TTL policy (default TTL and per-category overrides)
    #[arg(long, env = "PLANTITAS_CACHE_POLICY")]
    policy: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print aggregate cache statistics
    Stats,

    /// Look up a cached answer (counts as a hit)
    Lookup {
        question: String,
        #[arg(long)]
        context: Option<String>,
    },

    /// Store an answer
    Store {
        question: String,
        answer: String,
        #[arg(long)]
        context: Option<String>,
        /// Context category used to pick the TTL
        #[arg(long)]
        category: Option<String>,
    },

    /// Delete expired entries
    Purge,

    /// List the most reused answers
    Top {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Delete every entry
    Clear,

    /// Purge expired entries periodically until Ctrl-C
    Sweep {
        #[arg(long, default_value_t = CacheDefaults::SWEEP_INTERVAL.as_secs())]
        interval_secs: u64,
    },
}

/// `RUST_LOG` wins when it parses; otherwise `--debug` picks the level.
fn log_filter(rust_log: Option<&str>, debug: bool) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if debug { "debug" } else { "info" }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref(), args.debug))
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let db_path = match args.db {
        Some(path) => path,
        None => CacheDefaults::default_db_path()
            .context("No data directory on this platform; pass --db")?,
    };
    info!("Cache database: {}", db_path.display());

    let policy = match &args.policy {
        Some(path) => CachePolicyConfig::load(path)
            .with_context(|| format!("Failed to load policy from {}", path.display()))?,
        None => CachePolicyConfig::default(),
    };

    let store = SqliteCacheStore::new(&db_path)
        .with_context(|| format!("Failed to open cache at {}", db_path.display()))?;

    commands::run(args.command, store, CachePolicy::new(policy)).await
}
