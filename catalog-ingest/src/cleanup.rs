//! Staging teardown

use crate::qualifying::{QUALIFYING_ARTISTS, QUALIFYING_RELEASES};
use crate::transform::prepare::WORKING_TABLES;
use catalog_common::config::validate_identifier;
use catalog_common::Result;
use sqlx::postgres::PgPool;
use tracing::info;

/// Drop the working tables and the staging schema.
///
/// Every statement is `IF EXISTS`, so calling this on a partially built or
/// already removed schema is a no-op.
pub async fn teardown(pool: &PgPool, schema: &str) -> Result<()> {
    validate_identifier(schema)?;

    let tables = [QUALIFYING_ARTISTS, QUALIFYING_RELEASES]
        .into_iter()
        .chain(WORKING_TABLES);
    for table in tables {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}.{}", schema, table))
            .execute(pool)
            .await?;
    }

    sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
        .execute(pool)
        .await?;

    info!(schema = %schema, "Staging schema dropped");
    Ok(())
}
