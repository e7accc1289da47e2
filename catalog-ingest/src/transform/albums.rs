//! Album stage: one album per release group with a qualifying release

use super::{Stage, StageLoader};
use crate::transform::prepare::ALBUM_SOURCE;
use catalog_common::db::ReleaseType;
use catalog_common::Result;
use chrono::NaiveDate;
use sqlx::postgres::PgConnection;
use tracing::debug;
use uuid::Uuid;

/// Release-group projection, carrying the chosen release
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReleaseGroupRow {
    pub release_group_id: i32,
    pub mbid: Uuid,
    pub release_group_mbid: Uuid,
    pub name: Option<String>,
    pub artist_mbid: Option<Uuid>,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
    pub date_year: Option<i16>,
    pub date_month: Option<i16>,
    pub date_day: Option<i16>,
    pub country: Option<String>,
}

/// Build a date from partial parts.
///
/// Missing month or day default to 1; no year or an impossible date gives `None`.
pub fn compose_release_date(year: Option<i16>, month: Option<i16>, day: Option<i16>) -> Option<NaiveDate> {
    let year = i32::from(year?);
    let month = u32::try_from(month.unwrap_or(1)).ok()?;
    let day = u32::try_from(day.unwrap_or(1)).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub struct AlbumLoader;

impl StageLoader for AlbumLoader {
    type Row = ReleaseGroupRow;

    const STAGE: Stage = Stage::Albums;

    fn count_sql(&self, schema: &str) -> String {
        format!(
            r#"
            SELECT COUNT(*)
            FROM {s}.{src} src
            JOIN {s}.release rel ON rel.id = src.release_id
            JOIN {s}.release_group rg ON rg.id = src.release_group_id
            "#,
            s = schema,
            src = ALBUM_SOURCE
        )
    }

    fn fetch_sql(&self, schema: &str) -> String {
        format!(
            r#"
            SELECT src.release_group_id,
                   rel.gid AS mbid,
                   rg.gid AS release_group_mbid,
                   rg.name,
                   a.gid AS artist_mbid,
                   pt.name AS primary_type,
                   ARRAY(
                       SELECT st.name
                       FROM {s}.release_group_secondary_type_join j
                       JOIN {s}.release_group_secondary_type st ON st.id = j.secondary_type
                       WHERE j.release_group = rg.id AND st.name IS NOT NULL
                       ORDER BY st.name
                   ) AS secondary_types,
                   src.date_year,
                   src.date_month,
                   src.date_day,
                   (SELECT MIN(iso.code) FROM {s}.iso_3166_1 iso WHERE iso.area = src.country_area) AS country
            FROM {s}.{src} src
            JOIN {s}.release rel ON rel.id = src.release_id
            JOIN {s}.release_group rg ON rg.id = src.release_group_id
            LEFT JOIN {s}.artist_credit_name acn
                   ON acn.artist_credit = rel.artist_credit AND acn.position = 0
            LEFT JOIN {s}.artist a ON a.id = acn.artist
            LEFT JOIN {s}.release_group_primary_type pt ON pt.id = rg.type
            ORDER BY src.release_group_id
            LIMIT $1 OFFSET $2
            "#,
            s = schema,
            src = ALBUM_SOURCE
        )
    }

    async fn write_batch(&self, conn: &mut PgConnection, rows: Vec<ReleaseGroupRow>) -> Result<u64> {
        let len = rows.len();
        let mut names = Vec::with_capacity(len);
        let mut mbids = Vec::with_capacity(len);
        let mut group_mbids = Vec::with_capacity(len);
        let mut artist_mbids = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);
        let mut types = Vec::with_capacity(len);
        let mut countries = Vec::with_capacity(len);

        for row in rows {
            dates.push(compose_release_date(row.date_year, row.date_month, row.date_day));
            types.push(
                ReleaseType::from_upstream(row.primary_type.as_deref(), &row.secondary_types)
                    .as_str()
                    .to_string(),
            );
            names.push(row.name);
            mbids.push(row.mbid);
            group_mbids.push(row.release_group_mbid);
            artist_mbids.push(row.artist_mbid);
            countries.push(row.country);
        }

        // A release that moved to another group still holds its mbid on the old
        // group's album; release it there so the unique key is free
        let released = sqlx::query(
            r#"
            UPDATE albums
            SET mbid = NULL, updated_at = now()
            FROM UNNEST($1::uuid[], $2::uuid[]) AS u(mbid, release_group_mbid)
            WHERE albums.mbid = u.mbid
              AND albums.source = 0
              AND albums.release_group_mbid IS DISTINCT FROM u.release_group_mbid
            "#,
        )
        .bind(&mbids)
        .bind(&group_mbids)
        .execute(&mut *conn)
        .await?;
        if released.rows_affected() > 0 {
            debug!(albums = released.rows_affected(), "Cleared release mbids held by other release groups");
        }

        // Any remaining holder in another group is user-submitted; import without the mbid
        let result = sqlx::query(
            r#"
            INSERT INTO albums (name, mbid, release_group_mbid, band_id, release_date, release_type, country, source)
            SELECT u.name,
                   CASE WHEN EXISTS (
                       SELECT 1 FROM albums h
                       WHERE h.mbid = u.mbid
                         AND h.release_group_mbid IS DISTINCT FROM u.release_group_mbid
                   ) THEN NULL ELSE u.mbid END,
                   u.release_group_mbid, b.id, u.release_date, u.release_type, u.country, 0
            FROM UNNEST($1::text[], $2::uuid[], $3::uuid[], $4::uuid[], $5::date[], $6::text[], $7::text[])
                AS u(name, mbid, release_group_mbid, artist_mbid, release_date, release_type, country)
            LEFT JOIN bands b ON b.mbid = u.artist_mbid
            ON CONFLICT (release_group_mbid) DO UPDATE SET
                name = EXCLUDED.name,
                mbid = EXCLUDED.mbid,
                band_id = EXCLUDED.band_id,
                release_date = EXCLUDED.release_date,
                release_type = EXCLUDED.release_type,
                country = EXCLUDED.country,
                updated_at = now()
            WHERE albums.source = 0
            "#,
        )
        .bind(&names)
        .bind(&mbids)
        .bind(&group_mbids)
        .bind(&artist_mbids)
        .bind(&dates)
        .bind(&types)
        .bind(&countries)
        .execute(&mut *conn)
        .await?;

        debug!(rows = len, written = result.rows_affected(), "Album batch written");
        Ok(result.rows_affected())
    }
}
