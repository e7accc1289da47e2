//! Transform-load engine
//!
//! Moves the qualifying part of the staging schema into the canonical
//! tables, one stage per entity in dependency order: bands, albums, tracks,
//! aliases. Each stage pages its staging projection in fixed-size batches.
//! A batch is fetched, derived in Rust and written with a single set-based
//! upsert inside its own transaction; a failed batch is logged and skipped.
//!
//! Upserts only ever update rows whose `source` is external, so rows the
//! application has taken over are left exactly as they are.

pub mod albums;
pub mod aliases;
pub mod bands;
pub mod prepare;
pub mod slug;
pub mod tracks;

use catalog_common::config::validate_identifier;
use catalog_common::db::{count_rows, CanonicalTable};
use catalog_common::{Error, Result};
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::FromRow;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// Transform stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Bands,
    Albums,
    Tracks,
    BandAliases,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Bands, Stage::Albums, Stage::Tracks, Stage::BandAliases];

    pub fn name(&self) -> &'static str {
        self.table().table_name()
    }

    pub fn table(&self) -> CanonicalTable {
        match self {
            Stage::Bands => CanonicalTable::Bands,
            Stage::Albums => CanonicalTable::Albums,
            Stage::Tracks => CanonicalTable::Tracks,
            Stage::BandAliases => CanonicalTable::BandAliases,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub batches: u64,
    pub failed_batches: u64,
    /// Rows inserted or updated
    pub rows_written: u64,
    /// Canonical table row count after the stage
    pub canonical_rows: i64,
}

impl StageReport {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            batches: 0,
            failed_batches: 0,
            rows_written: 0,
            canonical_rows: 0,
        }
    }
}

/// One stage's staging projection and canonical write.
///
/// `fetch_sql` must page with `LIMIT $1 OFFSET $2` over a total order, and
/// `count_sql` must count the same rows.
pub(crate) trait StageLoader {
    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    const STAGE: Stage;

    fn count_sql(&self, schema: &str) -> String;

    fn fetch_sql(&self, schema: &str) -> String;

    /// Write one batch with a single statement; returns rows affected
    async fn write_batch(&self, conn: &mut PgConnection, rows: Vec<Self::Row>) -> Result<u64>;
}

/// Batched transform runner over one staging schema
#[derive(Debug, Clone)]
pub struct TransformEngine {
    pool: PgPool,
    schema: String,
    batch_size: i64,
    top_tags: i64,
}

impl TransformEngine {
    pub fn new(pool: PgPool, schema: impl Into<String>, batch_size: i64) -> Result<Self> {
        let schema = schema.into();
        validate_identifier(&schema)?;
        if batch_size < 1 {
            return Err(Error::InvalidInput(format!(
                "batch size must be at least 1 (got {})",
                batch_size
            )));
        }

        Ok(Self {
            pool,
            schema,
            batch_size,
            top_tags: 5,
        })
    }

    /// Number of tags kept per band as genres
    pub fn with_top_tags(mut self, top_tags: i64) -> Self {
        self.top_tags = top_tags.max(1);
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Build working tables, then run every stage in order
    pub async fn run(&self) -> Result<Vec<StageReport>> {
        self.prepare().await?;

        let mut reports = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            reports.push(self.run_stage(stage).await?);
        }
        Ok(reports)
    }

    /// Build the working tables the stage projections read from
    pub async fn prepare(&self) -> Result<()> {
        prepare::build_working_tables(&self.pool, &self.schema, self.top_tags).await
    }

    pub async fn run_stage(&self, stage: Stage) -> Result<StageReport> {
        match stage {
            Stage::Bands => self.run_loader(&bands::BandLoader).await,
            Stage::Albums => self.run_loader(&albums::AlbumLoader).await,
            Stage::Tracks => self.run_loader(&tracks::TrackLoader).await,
            Stage::BandAliases => self.run_loader(&aliases::AliasLoader).await,
        }
    }

    async fn run_loader<L: StageLoader>(&self, loader: &L) -> Result<StageReport> {
        let stage = L::STAGE;
        let started = Instant::now();

        // Source size is fixed at stage start; offsets advance past failed batches
        let total: i64 = sqlx::query_scalar(&loader.count_sql(&self.schema))
            .fetch_one(&self.pool)
            .await?;
        let fetch_sql = loader.fetch_sql(&self.schema);

        info!(
            stage = %stage,
            source_rows = total,
            batch_size = self.batch_size,
            "Stage starting"
        );

        let mut report = StageReport::new(stage);
        let mut offset = 0i64;
        while offset < total {
            let end = (offset + self.batch_size).min(total);
            match self.run_batch(loader, &fetch_sql, offset).await {
                Ok(written) => report.rows_written += written,
                Err(e) => {
                    report.failed_batches += 1;
                    warn!(
                        stage = %stage,
                        rows_from = offset,
                        rows_to = end,
                        error = %e,
                        "Batch failed, continuing with next batch"
                    );
                }
            }
            report.batches += 1;
            offset += self.batch_size;
        }

        report.canonical_rows = count_rows(&self.pool, stage.table()).await?;

        info!(
            stage = %stage,
            batches = report.batches,
            failed_batches = report.failed_batches,
            rows_written = report.rows_written,
            canonical_rows = report.canonical_rows,
            elapsed_secs = started.elapsed().as_secs(),
            "Stage complete"
        );
        Ok(report)
    }

    async fn run_batch<L: StageLoader>(&self, loader: &L, fetch_sql: &str, offset: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<L::Row> = sqlx::query_as(fetch_sql)
            .bind(self.batch_size)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?;

        let written = if rows.is_empty() {
            0
        } else {
            loader.write_batch(&mut *tx, rows).await?
        };

        tx.commit().await?;
        Ok(written)
    }
}
