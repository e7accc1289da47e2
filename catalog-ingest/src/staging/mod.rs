//! Staging schema loader
//!
//! Recreates the staging schema, bulk-loads each extracted flat file into its
//! positional mirror table and, once everything is in, builds the lookup
//! indexes and refreshes planner statistics.

pub mod copy;
pub mod tables;

pub use tables::{staging_table, StagingColumn, StagingTable, STAGING_TABLES};

use catalog_common::config::validate_identifier;
use catalog_common::Result;
use sqlx::postgres::PgPool;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Per-table outcome of a staging load
#[derive(Debug, Clone, Default)]
pub struct StagingReport {
    /// (table, rows loaded) in load order
    pub loaded: Vec<(&'static str, u64)>,
    /// Tables whose flat file was missing
    pub skipped: Vec<&'static str>,
}

impl StagingReport {
    pub fn rows(&self, table: &str) -> Option<u64> {
        self.loaded.iter().find(|(t, _)| *t == table).map(|(_, r)| *r)
    }

    pub fn total_rows(&self) -> u64 {
        self.loaded.iter().map(|(_, r)| r).sum()
    }
}

/// Drop and recreate `schema` with an empty table per declaration
pub async fn recreate_schema(pool: &PgPool, schema: &str, tables: &[StagingTable]) -> Result<()> {
    validate_identifier(schema)?;

    sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
        .execute(pool)
        .await?;
    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(pool)
        .await?;

    for table in tables {
        sqlx::query(&table.create_sql(schema)).execute(pool).await?;
    }

    info!(schema = %schema, tables = tables.len(), "Staging schema created");
    Ok(())
}

/// Load every declared staging table from `working_dir`.
///
/// Missing flat files are logged and skipped. Indexes and ANALYZE run only
/// after all loads.
pub async fn load_staging(pool: &PgPool, schema: &str, working_dir: &Path) -> Result<StagingReport> {
    let started = Instant::now();
    recreate_schema(pool, schema, STAGING_TABLES).await?;

    let mut report = StagingReport::default();
    for table in STAGING_TABLES {
        let path = working_dir.join(table.name);
        if !path.exists() {
            warn!(table = table.name, path = %path.display(), "Flat file missing, skipping table");
            report.skipped.push(table.name);
            continue;
        }

        info!(table = table.name, path = %path.display(), "Loading staging table");
        let rows = copy::copy_file(pool, schema, table, &path).await?;
        report.loaded.push((table.name, rows));
    }

    build_indexes(pool, schema).await?;

    info!(
        schema = %schema,
        tables = report.loaded.len(),
        skipped = report.skipped.len(),
        rows = report.total_rows(),
        elapsed_secs = started.elapsed().as_secs(),
        "Staging load complete"
    );
    Ok(report)
}

/// Create the declared secondary indexes, then ANALYZE every staging table
pub async fn build_indexes(pool: &PgPool, schema: &str) -> Result<()> {
    for table in STAGING_TABLES {
        for statement in table.index_sql(schema) {
            sqlx::query(&statement).execute(pool).await?;
        }
    }
    info!(schema = %schema, "Staging indexes built");

    for table in STAGING_TABLES {
        sqlx::query(&format!("ANALYZE {}.{}", schema, table.name))
            .execute(pool)
            .await?;
    }
    Ok(())
}
