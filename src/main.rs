//! # SDM Versions CLI (`sdmv`)
//!
//! The `sdmv` binary maintains the schema version catalog and serves it.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sdmv init` | Create the SQLite database and run schema migrations |
//! | `sdmv backfill` | Populate the catalog from full commit history |
//! | `sdmv update` | Append versions published since the last run |
//! | `sdmv versions <dataModel> [version]` | Look up stored versions |
//! | `sdmv stats` | Per-model catalog summary |
//! | `sdmv serve` | Start the read-only query service |
//!
//! ## Examples
//!
//! ```bash
//! sdmv --config ./config/sdmv.toml init
//! sdmv --config ./config/sdmv.toml backfill --model Weather/WeatherObserved
//! sdmv --config ./config/sdmv.toml update
//! sdmv --config ./config/sdmv.toml serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sdm_versions::models::TrackedModel;
use sdm_versions::{config, get, migrate, reconcile, server, stats};

/// SDM Versions — catalog of published Smart Data Model schema versions.
#[derive(Parser)]
#[command(
    name = "sdmv",
    about = "SDM Versions — catalog of published Smart Data Model schema versions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sdmv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Populate the catalog from the full commit history of each model.
    ///
    /// Safe to re-run: versions already in the catalog are not duplicated.
    Backfill {
        /// Restrict to specific models, as `Subject/DataModel`. Repeatable.
        #[arg(long = "model", value_parser = parse_model)]
        models: Vec<TrackedModel>,

        /// Discover versions and report them without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the newest commits of each model and append new versions.
    Update,

    /// Print stored versions of a data model (newest first), or the
    /// details of one version.
    Versions {
        /// Data model name.
        name: String,
        /// Specific version to look up.
        version: Option<String>,
    },

    /// Show per-model catalog statistics.
    Stats,

    /// Start the read-only query service on `[server].bind`.
    Serve,
}

fn parse_model(s: &str) -> Result<TrackedModel, String> {
    TrackedModel::parse(s).ok_or_else(|| format!("expected Subject/DataModel, got '{}'", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Backfill { models, dry_run } => {
            reconcile::run_backfill(&cfg, &models, dry_run).await?;
        }
        Commands::Update => {
            reconcile::run_update(&cfg).await?;
        }
        Commands::Versions { name, version } => {
            get::run_versions(&cfg, &name, version.as_deref()).await?;
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
