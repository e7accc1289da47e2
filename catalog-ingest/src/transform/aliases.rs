//! Alias stage: artist aliases of qualifying artists → `band_aliases`

use super::{Stage, StageLoader};
use crate::qualifying::QUALIFYING_ARTISTS;
use catalog_common::Result;
use sqlx::postgres::PgConnection;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AliasRow {
    pub alias_id: i32,
    pub artist_mbid: Uuid,
    pub name: Option<String>,
    pub locale: Option<String>,
}

pub struct AliasLoader;

impl StageLoader for AliasLoader {
    type Row = AliasRow;

    const STAGE: Stage = Stage::BandAliases;

    fn count_sql(&self, schema: &str) -> String {
        format!(
            r#"
            SELECT COUNT(*)
            FROM {s}.artist_alias aa
            JOIN {s}.{qa} qa ON qa.artist_id = aa.artist
            JOIN {s}.artist a ON a.id = aa.artist
            "#,
            s = schema,
            qa = QUALIFYING_ARTISTS
        )
    }

    fn fetch_sql(&self, schema: &str) -> String {
        format!(
            r#"
            SELECT aa.id AS alias_id,
                   a.gid AS artist_mbid,
                   aa.name,
                   aa.locale
            FROM {s}.artist_alias aa
            JOIN {s}.{qa} qa ON qa.artist_id = aa.artist
            JOIN {s}.artist a ON a.id = aa.artist
            ORDER BY aa.id
            LIMIT $1 OFFSET $2
            "#,
            s = schema,
            qa = QUALIFYING_ARTISTS
        )
    }

    /// Aliases without text are dropped; duplicates of a stored
    /// (band, name, locale) are skipped by the unique index
    async fn write_batch(&self, conn: &mut PgConnection, rows: Vec<AliasRow>) -> Result<u64> {
        let mut artist_mbids = Vec::with_capacity(rows.len());
        let mut names = Vec::with_capacity(rows.len());
        let mut locales = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(name) = row.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
                continue;
            };
            artist_mbids.push(row.artist_mbid);
            names.push(name);
            locales.push(row.locale.filter(|l| !l.is_empty()));
        }

        if names.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO band_aliases (band_id, name, locale)
            SELECT b.id, u.name, u.locale
            FROM UNNEST($1::uuid[], $2::text[], $3::text[]) AS u(artist_mbid, name, locale)
            JOIN bands b ON b.mbid = u.artist_mbid
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&artist_mbids)
        .bind(&names)
        .bind(&locales)
        .execute(&mut *conn)
        .await?;

        debug!(rows = names.len(), written = result.rows_affected(), "Alias batch written");
        Ok(result.rows_affected())
    }
}
