//! Band stage: qualifying artists → `bands`

use super::slug::{band_slug_base, SlugAssigner};
use super::{Stage, StageLoader};
use crate::qualifying::QUALIFYING_ARTISTS;
use crate::transform::prepare::ARTIST_TOP_TAGS;
use catalog_common::Result;
use sqlx::postgres::PgConnection;
use tracing::debug;
use uuid::Uuid;

/// Joins a band's genre list into one text value for array binding
const GENRE_SEPARATOR: char = '\u{1f}';

/// Artist projection from staging
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtistRow {
    pub artist_id: i32,
    pub mbid: Uuid,
    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub artist_type: Option<String>,
    pub country: Option<String>,
    pub genres: Vec<String>,
}

pub struct BandLoader;

impl StageLoader for BandLoader {
    type Row = ArtistRow;

    const STAGE: Stage = Stage::Bands;

    fn count_sql(&self, schema: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM {s}.{qa} qa JOIN {s}.artist a ON a.id = qa.artist_id",
            s = schema,
            qa = QUALIFYING_ARTISTS
        )
    }

    fn fetch_sql(&self, schema: &str) -> String {
        format!(
            r#"
            SELECT a.id AS artist_id,
                   a.gid AS mbid,
                   a.name,
                   a.sort_name,
                   aty.name AS artist_type,
                   COALESCE(
                       (SELECT MIN(iso.code) FROM {s}.iso_3166_1 iso WHERE iso.area = a.area),
                       (SELECT MIN(iso.code) FROM {s}.iso_3166_1 iso WHERE iso.area = a.begin_area)
                   ) AS country,
                   COALESCE(tt.genres, ARRAY[]::TEXT[]) AS genres
            FROM {s}.{qa} qa
            JOIN {s}.artist a ON a.id = qa.artist_id
            LEFT JOIN {s}.artist_type aty ON aty.id = a.type
            LEFT JOIN {s}.{tt} tt ON tt.artist_id = a.id
            ORDER BY a.id
            LIMIT $1 OFFSET $2
            "#,
            s = schema,
            qa = QUALIFYING_ARTISTS,
            tt = ARTIST_TOP_TAGS
        )
    }

    async fn write_batch(&self, conn: &mut PgConnection, rows: Vec<ArtistRow>) -> Result<u64> {
        let bases: Vec<String> = rows
            .iter()
            .map(|r| band_slug_base(r.name.as_deref(), &r.mbid))
            .collect();
        let mbids: Vec<Uuid> = rows.iter().map(|r| r.mbid).collect();

        let mut unique_bases = bases.clone();
        unique_bases.sort();
        unique_bases.dedup();

        let stored = load_slug_families(&mut *conn, &unique_bases, &mbids).await?;

        let mut assigner = SlugAssigner::new(stored);
        let slugs: Vec<String> = rows
            .iter()
            .zip(&bases)
            .map(|(r, base)| assigner.assign(r.mbid, base))
            .collect();

        let mut names = Vec::with_capacity(rows.len());
        let mut sort_names = Vec::with_capacity(rows.len());
        let mut artist_types = Vec::with_capacity(rows.len());
        let mut countries = Vec::with_capacity(rows.len());
        let mut genres = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.name);
            sort_names.push(row.sort_name);
            artist_types.push(row.artist_type);
            countries.push(row.country);
            genres.push(join_genres(&row.genres));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO bands (mbid, name, sort_name, artist_type, country, genres, slug, source)
            SELECT u.mbid, u.name, u.sort_name, u.artist_type, u.country,
                   string_to_array(u.genres, E'\x1F'), u.slug, 0
            FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[])
                AS u(mbid, name, sort_name, artist_type, country, genres, slug)
            ON CONFLICT (mbid) DO UPDATE SET
                name = EXCLUDED.name,
                sort_name = EXCLUDED.sort_name,
                artist_type = EXCLUDED.artist_type,
                country = EXCLUDED.country,
                genres = EXCLUDED.genres,
                slug = EXCLUDED.slug,
                updated_at = now()
            WHERE bands.source = 0
            "#,
        )
        .bind(&mbids)
        .bind(&names)
        .bind(&sort_names)
        .bind(&artist_types)
        .bind(&countries)
        .bind(&genres)
        .bind(&slugs)
        .execute(&mut *conn)
        .await?;

        debug!(rows = mbids.len(), written = result.rows_affected(), "Band batch written");
        Ok(result.rows_affected())
    }
}

/// Stored slugs equal to a base or starting with `<base>-`, plus the slugs
/// already held by `mbids`.
///
/// The prefix match uses byte-wise range operators so it can walk the
/// `text_pattern_ops` index on `bands.slug`. It also picks up slugs such as
/// `nirvana-grunge`; those never equal a `<base>-N` candidate, so they are
/// harmless extra entries.
async fn load_slug_families(
    conn: &mut PgConnection,
    bases: &[String],
    mbids: &[Uuid],
) -> Result<Vec<(String, Option<Uuid>)>> {
    let stored = sqlx::query_as(
        r#"
        SELECT b.slug, b.mbid
        FROM bands b
        WHERE b.slug = ANY($1)
        UNION
        SELECT b.slug, b.mbid
        FROM UNNEST($1::text[]) AS f(base)
        JOIN bands b
          ON b.slug ~>=~ (f.base || '-')
         AND b.slug ~<~ (f.base || '.')
        UNION
        SELECT b.slug, b.mbid
        FROM bands b
        WHERE b.mbid = ANY($2)
        "#,
    )
    .bind(bases)
    .bind(mbids)
    .fetch_all(conn)
    .await?;

    Ok(stored)
}

fn join_genres(genres: &[String]) -> String {
    genres
        .iter()
        .map(|g| g.replace(GENRE_SEPARATOR, " "))
        .collect::<Vec<_>>()
        .join(&GENRE_SEPARATOR.to_string())
}
