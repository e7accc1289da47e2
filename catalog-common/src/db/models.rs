//! Canonical catalog models
//!
//! Row types mirror the canonical tables created in [`super::init`].

use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Row provenance.
///
/// Stored as SMALLINT. The importer only ever overwrites `External` rows;
/// once the application marks a row `UserSubmitted` it is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    External = 0,
    UserSubmitted = 1,
}

/// Closed set of album release types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Album,
    Single,
    Ep,
    Compilation,
    Live,
    Remix,
    Soundtrack,
    Other,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Album => "album",
            ReleaseType::Single => "single",
            ReleaseType::Ep => "ep",
            ReleaseType::Compilation => "compilation",
            ReleaseType::Live => "live",
            ReleaseType::Remix => "remix",
            ReleaseType::Soundtrack => "soundtrack",
            ReleaseType::Other => "other",
        }
    }

    /// Map upstream release-group type names onto the closed set.
    ///
    /// Secondary types are more specific than the primary one, so a
    /// compilation/live/remix/soundtrack secondary type wins (checked in that
    /// order). Otherwise Album/Single/EP primary types map directly and
    /// anything else is `Other`. Matching is case-insensitive.
    pub fn from_upstream(primary: Option<&str>, secondary: &[String]) -> Self {
        let has_secondary = |wanted: &str| secondary.iter().any(|s| s.eq_ignore_ascii_case(wanted));

        if has_secondary("compilation") {
            return ReleaseType::Compilation;
        }
        if has_secondary("live") {
            return ReleaseType::Live;
        }
        if has_secondary("remix") {
            return ReleaseType::Remix;
        }
        if has_secondary("soundtrack") {
            return ReleaseType::Soundtrack;
        }

        match primary.map(|p| p.to_ascii_lowercase()).as_deref() {
            Some("album") => ReleaseType::Album,
            Some("single") => ReleaseType::Single,
            Some("ep") => ReleaseType::Ep,
            _ => ReleaseType::Other,
        }
    }
}

impl std::str::FromStr for ReleaseType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "album" => Ok(ReleaseType::Album),
            "single" => Ok(ReleaseType::Single),
            "ep" => Ok(ReleaseType::Ep),
            "compilation" => Ok(ReleaseType::Compilation),
            "live" => Ok(ReleaseType::Live),
            "remix" => Ok(ReleaseType::Remix),
            "soundtrack" => Ok(ReleaseType::Soundtrack),
            "other" => Ok(ReleaseType::Other),
            _ => Err(crate::Error::InvalidInput(format!("Unknown release type: {}", s))),
        }
    }
}

/// Canonical tables, in import dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalTable {
    Bands,
    Albums,
    Tracks,
    BandAliases,
}

impl CanonicalTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            CanonicalTable::Bands => "bands",
            CanonicalTable::Albums => "albums",
            CanonicalTable::Tracks => "tracks",
            CanonicalTable::BandAliases => "band_aliases",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Band {
    pub id: i64,
    pub name: String,
    pub sort_name: Option<String>,
    pub mbid: Option<Uuid>,
    pub country: Option<String>,
    pub artist_type: Option<String>,
    pub genres: Vec<String>,
    pub slug: String,
    pub source: Source,
    pub verified: bool,
    pub user_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub mbid: Option<Uuid>,
    pub release_group_mbid: Option<Uuid>,
    pub band_id: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub release_type: String,
    pub country: Option<String>,
    pub source: Source,
    pub verified: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Track {
    pub id: i64,
    pub name: String,
    pub mbid: Option<Uuid>,
    pub band_id: Option<i64>,
    pub album_id: Option<i64>,
    pub duration_ms: Option<i32>,
    pub track_number: Option<i32>,
    pub disc_number: Option<i32>,
    pub isrc: Option<String>,
    pub source: Source,
    pub verified: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BandAlias {
    pub id: i64,
    pub band_id: i64,
    pub name: String,
    pub locale: Option<String>,
}

/// Count rows in a canonical table
pub async fn count_rows(pool: &PgPool, table: CanonicalTable) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// Load a band by its upstream artist identifier
pub async fn load_band_by_mbid(pool: &PgPool, mbid: Uuid) -> Result<Option<Band>> {
    let band = sqlx::query_as::<_, Band>(
        r#"
        SELECT id, name, sort_name, mbid, country, artist_type, genres, slug,
               source, verified, user_id, updated_at
        FROM bands
        WHERE mbid = $1
        "#,
    )
    .bind(mbid)
    .fetch_optional(pool)
    .await?;

    Ok(band)
}

/// Load an album by its release-group identifier
pub async fn load_album_by_release_group(pool: &PgPool, release_group_mbid: Uuid) -> Result<Option<Album>> {
    let album = sqlx::query_as::<_, Album>(
        r#"
        SELECT id, name, mbid, release_group_mbid, band_id, release_date, release_type,
               country, source, verified
        FROM albums
        WHERE release_group_mbid = $1
        "#,
    )
    .bind(release_group_mbid)
    .fetch_optional(pool)
    .await?;

    Ok(album)
}

/// Load a track by its upstream recording identifier
pub async fn load_track_by_mbid(pool: &PgPool, mbid: Uuid) -> Result<Option<Track>> {
    let track = sqlx::query_as::<_, Track>(
        r#"
        SELECT id, name, mbid, band_id, album_id, duration_ms, track_number, disc_number,
               isrc, source, verified
        FROM tracks
        WHERE mbid = $1
        "#,
    )
    .bind(mbid)
    .fetch_optional(pool)
    .await?;

    Ok(track)
}

/// Load all aliases of a band
pub async fn load_band_aliases(pool: &PgPool, band_id: i64) -> Result<Vec<BandAlias>> {
    let aliases = sqlx::query_as::<_, BandAlias>(
        "SELECT id, band_id, name, locale FROM band_aliases WHERE band_id = $1 ORDER BY id",
    )
    .bind(band_id)
    .fetch_all(pool)
    .await?;

    Ok(aliases)
}

/// Mark a band as user-submitted (what the application does when a user edits it)
pub async fn mark_band_user_submitted(pool: &PgPool, band_id: i64, user_id: Option<i64>) -> Result<()> {
    sqlx::query("UPDATE bands SET source = $1, user_id = $2, updated_at = now() WHERE id = $3")
        .bind(Source::UserSubmitted)
        .bind(user_id)
        .bind(band_id)
        .execute(pool)
        .await?;

    Ok(())
}
