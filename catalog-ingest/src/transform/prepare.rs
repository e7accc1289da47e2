//! Working tables the stage projections read from
//!
//! All are derived from the staging tables and the qualifying sets and live
//! in the staging schema, so teardown removes them with everything else.

use crate::qualifying::QUALIFYING_RELEASES;
use catalog_common::Result;
use sqlx::postgres::PgPool;
use tracing::info;

pub const ARTIST_TOP_TAGS: &str = "artist_top_tags";
pub const RELEASE_FIRST_DATE: &str = "release_first_date";
pub const ALBUM_SOURCE: &str = "album_source";
pub const TRACK_SOURCE: &str = "track_source";

/// Working tables in build order
pub const WORKING_TABLES: [&str; 4] = [ARTIST_TOP_TAGS, RELEASE_FIRST_DATE, ALBUM_SOURCE, TRACK_SOURCE];

/// Rebuild every working table
pub async fn build_working_tables(pool: &PgPool, schema: &str, top_tags: i64) -> Result<()> {
    for table in WORKING_TABLES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}.{}", schema, table))
            .execute(pool)
            .await?;
    }

    build_artist_top_tags(pool, schema, top_tags).await?;
    build_release_first_date(pool, schema).await?;
    build_album_source(pool, schema).await?;
    build_track_source(pool, schema).await?;

    for table in WORKING_TABLES {
        sqlx::query(&format!("ANALYZE {}.{}", schema, table))
            .execute(pool)
            .await?;
    }

    info!(schema = %schema, top_tags, "Transform working tables built");
    Ok(())
}

/// Top-N tags per qualifying artist by vote count, ties broken by tag name
async fn build_artist_top_tags(pool: &PgPool, schema: &str, top_tags: i64) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE {}.{} (artist_id INTEGER PRIMARY KEY, genres TEXT[] NOT NULL)",
        schema, ARTIST_TOP_TAGS
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {s}.{t} (artist_id, genres)
        SELECT ranked.artist, array_agg(ranked.name ORDER BY ranked.rank)
        FROM (
            SELECT atg.artist, tg.name,
                   row_number() OVER (PARTITION BY atg.artist ORDER BY atg.count DESC, tg.name) AS rank
            FROM {s}.artist_tag atg
            JOIN {s}.qualifying_artists qa ON qa.artist_id = atg.artist
            JOIN {s}.tag tg ON tg.id = atg.tag
            WHERE atg.count > 0 AND tg.name IS NOT NULL
        ) ranked
        WHERE ranked.rank <= $1
        GROUP BY ranked.artist
        "#,
        s = schema,
        t = ARTIST_TOP_TAGS
    ))
    .bind(top_tags)
    .execute(pool)
    .await?;

    Ok(())
}

/// Earliest known date per qualifying release, from both the per-country
/// and the unknown-country release events
async fn build_release_first_date(pool: &PgPool, schema: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE {s}.{t} AS
        SELECT DISTINCT ON (ev.release)
               ev.release AS release_id, ev.date_year, ev.date_month, ev.date_day, ev.country_area
        FROM (
            SELECT rc.release, rc.date_year, rc.date_month, rc.date_day, rc.country AS country_area
            FROM {s}.release_country rc
            UNION ALL
            SELECT ruc.release, ruc.date_year, ruc.date_month, ruc.date_day, NULL::INTEGER
            FROM {s}.release_unknown_country ruc
        ) ev
        JOIN {s}.{qr} qr ON qr.release_id = ev.release
        ORDER BY ev.release,
                 ev.date_year ASC NULLS LAST,
                 ev.date_month ASC NULLS LAST,
                 ev.date_day ASC NULLS LAST,
                 ev.country_area ASC NULLS LAST
        "#,
        s = schema,
        t = RELEASE_FIRST_DATE,
        qr = QUALIFYING_RELEASES
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "ALTER TABLE {}.{} ADD PRIMARY KEY (release_id)",
        schema, RELEASE_FIRST_DATE
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// One qualifying release per release group: earliest date, undated last,
/// then lowest release id
async fn build_album_source(pool: &PgPool, schema: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE {s}.{t} AS
        SELECT DISTINCT ON (rel.release_group)
               rel.release_group AS release_group_id,
               rel.id AS release_id,
               rfd.date_year, rfd.date_month, rfd.date_day, rfd.country_area
        FROM {s}.{qr} qr
        JOIN {s}.release rel ON rel.id = qr.release_id
        LEFT JOIN {s}.{rfd} rfd ON rfd.release_id = rel.id
        WHERE rel.release_group IS NOT NULL
        ORDER BY rel.release_group,
                 rfd.date_year ASC NULLS LAST,
                 rfd.date_month ASC NULLS LAST,
                 rfd.date_day ASC NULLS LAST,
                 rel.id
        "#,
        s = schema,
        t = ALBUM_SOURCE,
        qr = QUALIFYING_RELEASES,
        rfd = RELEASE_FIRST_DATE
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "ALTER TABLE {}.{} ADD PRIMARY KEY (release_group_id)",
        schema, ALBUM_SOURCE
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// One (medium, track) pairing per recording on a qualifying release,
/// first by release id, medium position, track position, track id
async fn build_track_source(pool: &PgPool, schema: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE {s}.{t} AS
        SELECT DISTINCT ON (tr.recording)
               tr.recording AS recording_id,
               tr.id AS track_id,
               tr.position AS track_position,
               m.position AS disc_position,
               rel.release_group AS release_group_id
        FROM {s}.track tr
        JOIN {s}.medium m ON m.id = tr.medium
        JOIN {s}.{qr} qr ON qr.release_id = m.release
        JOIN {s}.release rel ON rel.id = m.release
        WHERE tr.recording IS NOT NULL
        ORDER BY tr.recording, rel.id, m.position, tr.position, tr.id
        "#,
        s = schema,
        t = TRACK_SOURCE,
        qr = QUALIFYING_RELEASES
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "ALTER TABLE {}.{} ADD PRIMARY KEY (recording_id)",
        schema, TRACK_SOURCE
    ))
    .execute(pool)
    .await?;

    Ok(())
}
