//! End-to-end ingestion run
//!
//! acquire → stage → qualify → transform → cleanup. Each step is also
//! exposed on its own so a failed run can be resumed from any stage.

use crate::acquire::{AcquireReport, ArchiveAcquirer};
use crate::cleanup::teardown;
use crate::config::IngestConfig;
use crate::qualifying::{build_qualifying_sets, QualifyingSets};
use crate::staging::{load_staging, StagingReport};
use crate::transform::{StageReport, TransformEngine};
use anyhow::{bail, Context};
use catalog_common::db::ensure_canonical_schema;
use sqlx::postgres::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Qualifying sets plus per-stage transform outcomes
#[derive(Debug, Clone)]
pub struct TransformReport {
    pub qualifying: QualifyingSets,
    pub stages: Vec<StageReport>,
}

impl TransformReport {
    pub fn failed_batches(&self) -> u64 {
        self.stages.iter().map(|s| s.failed_batches).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub acquire: AcquireReport,
    pub staging: StagingReport,
    pub transform: TransformReport,
}

/// Download and extract the snapshot archives into the working directory
pub async fn acquire(config: &IngestConfig, cancel: &CancellationToken) -> anyhow::Result<AcquireReport> {
    let acquirer = ArchiveAcquirer::new(&config.base_url, &config.working_dir, config.max_redirects)
        .context("Failed to build HTTP client")?;

    let report = acquirer
        .acquire(config.snapshot.as_deref(), cancel)
        .await
        .context("Archive acquisition failed")?;
    Ok(report)
}

/// Build qualifying sets and run every transform stage
pub async fn run_transform(pool: &PgPool, config: &IngestConfig) -> catalog_common::Result<TransformReport> {
    ensure_canonical_schema(pool).await?;

    let qualifying = build_qualifying_sets(pool, &config.staging_schema, config.artist_cap).await?;

    let engine = TransformEngine::new(pool.clone(), &config.staging_schema, config.batch_size)?
        .with_top_tags(config.top_tags);
    let stages = engine.run().await?;

    Ok(TransformReport { qualifying, stages })
}

/// Full run. The staging schema is torn down afterwards whether or not the
/// run succeeded, unless `keep_staging` is set.
pub async fn run_pipeline(
    pool: &PgPool,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<PipelineReport> {
    let result = run_stages(pool, config, cancel).await;

    if config.keep_staging {
        warn!(schema = %config.staging_schema, "Keeping staging schema as requested");
    } else if let Err(e) = teardown(pool, &config.staging_schema).await {
        error!(schema = %config.staging_schema, error = %e, "Staging cleanup failed");
        if result.is_ok() {
            return Err(e).context("Staging cleanup failed");
        }
    }

    result
}

async fn run_stages(
    pool: &PgPool,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<PipelineReport> {
    let acquired = acquire(config, cancel).await?;
    info!(snapshot = %acquired.snapshot, "Snapshot acquired");

    if cancel.is_cancelled() {
        bail!("Run cancelled before staging");
    }
    let staging = load_staging(pool, &config.staging_schema, &config.working_dir)
        .await
        .context("Staging load failed")?;

    if cancel.is_cancelled() {
        bail!("Run cancelled before transform");
    }
    let transform = run_transform(pool, config)
        .await
        .context("Transform failed")?;

    info!(
        snapshot = %acquired.snapshot,
        staged_rows = staging.total_rows(),
        artists = transform.qualifying.artists,
        releases = transform.qualifying.releases,
        failed_batches = transform.failed_batches(),
        "Pipeline complete"
    );

    Ok(PipelineReport {
        acquire: acquired,
        staging,
        transform,
    })
}
