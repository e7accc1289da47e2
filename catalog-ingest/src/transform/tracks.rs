//! Track stage: one track per recording on a qualifying release

use super::{Stage, StageLoader};
use crate::transform::prepare::TRACK_SOURCE;
use catalog_common::Result;
use sqlx::postgres::PgConnection;
use tracing::debug;
use uuid::Uuid;

/// Recording projection with its chosen (medium, track) pairing
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecordingRow {
    pub recording_id: i32,
    pub mbid: Uuid,
    pub name: Option<String>,
    pub length_ms: Option<i32>,
    pub track_position: Option<i32>,
    pub disc_position: Option<i32>,
    pub isrc: Option<String>,
    pub artist_mbid: Option<Uuid>,
    pub release_group_mbid: Option<Uuid>,
}

/// Upstream lengths are milliseconds; zero or negative means unknown
fn duration_ms(length: Option<i32>) -> Option<i32> {
    length.filter(|ms| *ms > 0)
}

pub struct TrackLoader;

impl StageLoader for TrackLoader {
    type Row = RecordingRow;

    const STAGE: Stage = Stage::Tracks;

    fn count_sql(&self, schema: &str) -> String {
        format!(
            r#"
            SELECT COUNT(*)
            FROM {s}.{ts} ts
            JOIN {s}.recording r ON r.id = ts.recording_id
            "#,
            s = schema,
            ts = TRACK_SOURCE
        )
    }

    fn fetch_sql(&self, schema: &str) -> String {
        format!(
            r#"
            SELECT ts.recording_id,
                   r.gid AS mbid,
                   r.name,
                   r.length AS length_ms,
                   ts.track_position,
                   ts.disc_position,
                   (SELECT MIN(i.isrc) FROM {s}.isrc i WHERE i.recording = r.id) AS isrc,
                   a.gid AS artist_mbid,
                   rg.gid AS release_group_mbid
            FROM {s}.{ts} ts
            JOIN {s}.recording r ON r.id = ts.recording_id
            LEFT JOIN {s}.release_group rg ON rg.id = ts.release_group_id
            LEFT JOIN {s}.artist_credit_name acn
                   ON acn.artist_credit = r.artist_credit AND acn.position = 0
            LEFT JOIN {s}.artist a ON a.id = acn.artist
            ORDER BY ts.recording_id
            LIMIT $1 OFFSET $2
            "#,
            s = schema,
            ts = TRACK_SOURCE
        )
    }

    async fn write_batch(&self, conn: &mut PgConnection, rows: Vec<RecordingRow>) -> Result<u64> {
        let len = rows.len();
        let mut names = Vec::with_capacity(len);
        let mut mbids = Vec::with_capacity(len);
        let mut artist_mbids = Vec::with_capacity(len);
        let mut group_mbids = Vec::with_capacity(len);
        let mut durations = Vec::with_capacity(len);
        let mut track_numbers = Vec::with_capacity(len);
        let mut disc_numbers = Vec::with_capacity(len);
        let mut isrcs = Vec::with_capacity(len);

        for row in rows {
            names.push(row.name);
            mbids.push(row.mbid);
            artist_mbids.push(row.artist_mbid);
            group_mbids.push(row.release_group_mbid);
            durations.push(duration_ms(row.length_ms));
            track_numbers.push(row.track_position);
            disc_numbers.push(row.disc_position);
            isrcs.push(row.isrc);
        }

        // Band: the recording's own credited artist, else the album's band
        let result = sqlx::query(
            r#"
            INSERT INTO tracks (name, mbid, band_id, album_id, duration_ms, track_number, disc_number, isrc, source)
            SELECT u.name, u.mbid, COALESCE(b.id, al.band_id), al.id,
                   u.duration_ms, u.track_number, u.disc_number, u.isrc, 0
            FROM UNNEST($1::text[], $2::uuid[], $3::uuid[], $4::uuid[], $5::int4[], $6::int4[], $7::int4[], $8::text[])
                AS u(name, mbid, artist_mbid, release_group_mbid, duration_ms, track_number, disc_number, isrc)
            LEFT JOIN bands b ON b.mbid = u.artist_mbid
            LEFT JOIN albums al ON al.release_group_mbid = u.release_group_mbid
            ON CONFLICT (mbid) DO UPDATE SET
                name = EXCLUDED.name,
                band_id = EXCLUDED.band_id,
                album_id = EXCLUDED.album_id,
                duration_ms = EXCLUDED.duration_ms,
                track_number = EXCLUDED.track_number,
                disc_number = EXCLUDED.disc_number,
                isrc = EXCLUDED.isrc,
                updated_at = now()
            WHERE tracks.source = 0
            "#,
        )
        .bind(&names)
        .bind(&mbids)
        .bind(&artist_mbids)
        .bind(&group_mbids)
        .bind(&durations)
        .bind(&track_numbers)
        .bind(&disc_numbers)
        .bind(&isrcs)
        .execute(&mut *conn)
        .await?;

        debug!(rows = len, written = result.rows_affected(), "Track batch written");
        Ok(result.rows_affected())
    }
}
