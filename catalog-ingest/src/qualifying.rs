//! Qualifying-set builder
//!
//! Narrows the dump to the part the catalog cares about:
//! - artists credited on at least one recording that has an ISRC
//! - releases whose primary credited artist qualifies and that have cover art
//!
//! Both sets are materialized as keyed tables in the staging schema.

use catalog_common::config::validate_identifier;
use catalog_common::Result;
use sqlx::postgres::PgPool;
use tracing::info;

pub const QUALIFYING_ARTISTS: &str = "qualifying_artists";
pub const QUALIFYING_RELEASES: &str = "qualifying_releases";

/// Sizes of the materialized qualifying sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifyingSets {
    pub artists: i64,
    pub releases: i64,
}

/// Build both qualifying sets, replacing any previous ones.
///
/// With `artist_cap` the artist set is the first `cap` qualifying artist ids,
/// so the same dump always yields the same sample.
pub async fn build_qualifying_sets(
    pool: &PgPool,
    schema: &str,
    artist_cap: Option<i64>,
) -> Result<QualifyingSets> {
    validate_identifier(schema)?;

    let artists = build_qualifying_artists(pool, schema, artist_cap).await?;
    let releases = build_qualifying_releases(pool, schema).await?;

    for table in [QUALIFYING_ARTISTS, QUALIFYING_RELEASES] {
        sqlx::query(&format!("ANALYZE {}.{}", schema, table))
            .execute(pool)
            .await?;
    }

    let sets = QualifyingSets { artists, releases };
    info!(
        artists = sets.artists,
        releases = sets.releases,
        cap = ?artist_cap,
        "Qualifying sets built"
    );
    Ok(sets)
}

async fn build_qualifying_artists(pool: &PgPool, schema: &str, artist_cap: Option<i64>) -> Result<i64> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}.{}", schema, QUALIFYING_ARTISTS))
        .execute(pool)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE {}.{} (artist_id INTEGER PRIMARY KEY)",
        schema, QUALIFYING_ARTISTS
    ))
    .execute(pool)
    .await?;

    // LIMIT NULL means no limit
    let inserted = sqlx::query(&format!(
        r#"
        INSERT INTO {s}.{t} (artist_id)
        SELECT DISTINCT acn.artist
        FROM {s}.artist_credit_name acn
        JOIN {s}.recording r ON r.artist_credit = acn.artist_credit
        WHERE acn.artist IS NOT NULL
          AND EXISTS (SELECT 1 FROM {s}.isrc i WHERE i.recording = r.id)
        ORDER BY acn.artist
        LIMIT $1
        "#,
        s = schema,
        t = QUALIFYING_ARTISTS
    ))
    .bind(artist_cap)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted as i64)
}

async fn build_qualifying_releases(pool: &PgPool, schema: &str) -> Result<i64> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}.{}", schema, QUALIFYING_RELEASES))
        .execute(pool)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE {}.{} (release_id INTEGER PRIMARY KEY)",
        schema, QUALIFYING_RELEASES
    ))
    .execute(pool)
    .await?;

    let inserted = sqlx::query(&format!(
        r#"
        INSERT INTO {s}.{t} (release_id)
        SELECT DISTINCT rel.id
        FROM {s}.release rel
        JOIN {s}.artist_credit_name acn
          ON acn.artist_credit = rel.artist_credit AND acn.position = 0
        JOIN {s}.{qa} qa ON qa.artist_id = acn.artist
        WHERE EXISTS (SELECT 1 FROM {s}.cover_art ca WHERE ca.release = rel.id)
        "#,
        s = schema,
        t = QUALIFYING_RELEASES,
        qa = QUALIFYING_ARTISTS
    ))
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted as i64)
}
