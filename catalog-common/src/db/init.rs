//! Database connection and canonical schema creation
//!
//! The canonical tables are normally owned by the application; creating them
//! here (idempotently) lets the importer run against an empty database.

use crate::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Connect to PostgreSQL.
///
/// No acquire timeout beyond the connect phase: stages issue statements that
/// run for a long time and hold their connection throughout.
pub async fn connect_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    info!("Connected to database");
    Ok(pool)
}

/// Create canonical tables and indexes if they do not exist (idempotent)
pub async fn ensure_canonical_schema(pool: &PgPool) -> Result<()> {
    create_bands_table(pool).await?;
    create_albums_table(pool).await?;
    create_tracks_table(pool).await?;
    create_band_aliases_table(pool).await?;

    info!("Canonical schema ready (bands, albums, tracks, band_aliases)");
    Ok(())
}

/// Bands: one row per artist, natural key `mbid`, globally unique `slug`
pub async fn create_bands_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bands (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            sort_name TEXT,
            mbid UUID UNIQUE,
            country TEXT,
            artist_type TEXT,
            genres TEXT[] NOT NULL DEFAULT '{}',
            slug TEXT NOT NULL UNIQUE,
            source SMALLINT NOT NULL DEFAULT 0,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            user_id BIGINT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Byte-wise ordering for slug prefix lookups (`~>=~` / `~<~`)
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bands_slug_pattern ON bands (slug text_pattern_ops)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Albums: one row per release group, keyed by both release and release-group MBID
pub async fn create_albums_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            mbid UUID UNIQUE,
            release_group_mbid UUID UNIQUE,
            band_id BIGINT REFERENCES bands(id) ON DELETE SET NULL,
            release_date DATE,
            release_type TEXT NOT NULL DEFAULT 'other' CHECK (release_type IN
                ('album', 'single', 'ep', 'compilation', 'live', 'remix', 'soundtrack', 'other')),
            country TEXT,
            source SMALLINT NOT NULL DEFAULT 0,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_albums_band_id ON albums(band_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Tracks: one row per recording
pub async fn create_tracks_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            mbid UUID UNIQUE,
            band_id BIGINT REFERENCES bands(id) ON DELETE SET NULL,
            album_id BIGINT REFERENCES albums(id) ON DELETE SET NULL,
            duration_ms INTEGER,
            track_number INTEGER,
            disc_number INTEGER,
            isrc TEXT,
            source SMALLINT NOT NULL DEFAULT 0,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_band_id ON tracks(band_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_album_id ON tracks(album_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Band aliases: (band, name) may repeat across locales, never within one
pub async fn create_band_aliases_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS band_aliases (
            id BIGSERIAL PRIMARY KEY,
            band_id BIGINT NOT NULL REFERENCES bands(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            locale TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_band_aliases_unique
            ON band_aliases (band_id, name, COALESCE(locale, ''))
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
