//! catalog-ingest - MusicBrainz dump importer
//!
//! Subcommands run one pipeline step each (`fetch`, `stage`, `transform`,
//! `cleanup`) or the whole chain (`run`). Settings come from the command
//! line, then the environment, then the TOML config file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use catalog_common::config::{
    default_config_path, load_toml_config, resolve_database_url, TomlConfig, DATABASE_URL_ENV,
    WORKING_DIR_ENV,
};
use catalog_common::db::{connect_pool, ensure_canonical_schema};
use catalog_common::logging::init_logging;
use catalog_ingest::{CliOverrides, IngestConfig};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for catalog-ingest
#[derive(Parser, Debug)]
#[command(name = "catalog-ingest")]
#[command(about = "Import the MusicBrainz full export into the catalog database")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/catalog-ingest/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = DATABASE_URL_ENV)]
    database_url: Option<String>,

    /// Directory for archives and extracted flat files
    #[arg(short, long, global = true, env = WORKING_DIR_ENV)]
    working_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download and extract the snapshot archives
    Fetch {
        /// Snapshot name (YYYYMMDD-HHMMSS) or "latest"
        #[arg(long)]
        snapshot: Option<String>,
    },
    /// Load extracted flat files into the staging schema
    Stage,
    /// Build qualifying sets and upsert into the canonical tables
    Transform {
        /// Limit the qualifying artist set (sampling / test runs)
        #[arg(long)]
        artist_cap: Option<i64>,

        /// Rows per transform batch
        #[arg(long)]
        batch_size: Option<i64>,
    },
    /// Drop the staging schema
    Cleanup,
    /// Fetch, stage, transform and clean up
    Run {
        #[arg(long)]
        snapshot: Option<String>,

        #[arg(long)]
        artist_cap: Option<i64>,

        #[arg(long)]
        batch_size: Option<i64>,

        /// Leave the staging schema in place for inspection
        #[arg(long)]
        keep_staging: bool,
    },
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides {
            working_dir: self.working_dir.clone(),
            ..CliOverrides::default()
        };

        match &self.command {
            Command::Fetch { snapshot } => {
                overrides.snapshot = snapshot.clone();
            }
            Command::Transform {
                artist_cap,
                batch_size,
            } => {
                overrides.artist_cap = *artist_cap;
                overrides.batch_size = *batch_size;
            }
            Command::Run {
                snapshot,
                artist_cap,
                batch_size,
                keep_staging,
            } => {
                overrides.snapshot = snapshot.clone();
                overrides.artist_cap = *artist_cap;
                overrides.batch_size = *batch_size;
                overrides.keep_staging = *keep_staging;
            }
            Command::Stage | Command::Cleanup => {}
        }

        overrides
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml = match args.config.clone().or_else(default_config_path) {
        Some(path) => load_toml_config(&path)?,
        None => TomlConfig::default(),
    };
    init_logging(&toml.logging)?;

    info!("Starting catalog-ingest v{}", env!("CARGO_PKG_VERSION"));

    let config = IngestConfig::resolve(&toml, &args.overrides())?;
    info!(
        working_dir = %config.working_dir.display(),
        schema = %config.staging_schema,
        batch_size = config.batch_size,
        artist_cap = ?config.artist_cap,
        "Configuration resolved"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match args.command {
        Command::Fetch { .. } => {
            let report = catalog_ingest::acquire(&config, &cancel).await?;
            info!(snapshot = %report.snapshot, archives = report.archives.len(), "Fetch complete");
        }
        Command::Stage => {
            let pool = connect(&args.database_url, &toml).await?;
            let report = catalog_ingest::load_staging(&pool, &config.staging_schema, &config.working_dir)
                .await
                .context("Staging load failed")?;
            info!(
                tables = report.loaded.len(),
                skipped = ?report.skipped,
                rows = report.total_rows(),
                "Stage complete"
            );
        }
        Command::Transform { .. } => {
            let pool = connect(&args.database_url, &toml).await?;
            let report = catalog_ingest::run_transform(&pool, &config)
                .await
                .context("Transform failed")?;
            for stage in &report.stages {
                info!(
                    stage = %stage.stage,
                    rows_written = stage.rows_written,
                    failed_batches = stage.failed_batches,
                    canonical_rows = stage.canonical_rows,
                    "Stage summary"
                );
            }
        }
        Command::Cleanup => {
            let pool = connect(&args.database_url, &toml).await?;
            catalog_ingest::teardown(&pool, &config.staging_schema)
                .await
                .context("Cleanup failed")?;
        }
        Command::Run { .. } => {
            let pool = connect(&args.database_url, &toml).await?;
            let report = catalog_ingest::run_pipeline(&pool, &config, &cancel).await?;
            if report.transform.failed_batches() > 0 {
                warn!(
                    failed_batches = report.transform.failed_batches(),
                    "Run finished with failed batches; see warnings above"
                );
            }
        }
    }

    Ok(())
}

async fn connect(cli_url: &Option<String>, toml: &TomlConfig) -> Result<PgPool> {
    let url = resolve_database_url(cli_url.as_deref(), toml)?;
    let pool = connect_pool(&url).await.context("Failed to connect to database")?;
    ensure_canonical_schema(&pool)
        .await
        .context("Failed to prepare canonical tables")?;
    Ok(pool)
}

/// Cancel in-flight downloads on Ctrl+C
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Received Ctrl+C, cancelling");
        cancel.cancel();
    }
}
