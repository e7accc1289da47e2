//! Shared test helpers: database access and dump fixtures

#![allow(dead_code)]

use catalog_common::db::{connect_pool, ensure_canonical_schema};
use catalog_ingest::staging::{staging_table, STAGING_TABLES};
use catalog_ingest::IngestConfig;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

pub const TEST_DATABASE_URL_ENV: &str = "TEST_DATABASE_URL";
pub const TEST_SCHEMA: &str = "catalog_test_staging";

/// Connect to the test database, or `None` (with a note) when not configured
pub async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var(TEST_DATABASE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("{} not set, skipping database test", TEST_DATABASE_URL_ENV);
            return None;
        }
    };

    let pool = connect_pool(&url).await.expect("connect to test database");
    ensure_canonical_schema(&pool).await.expect("create canonical tables");
    reset_database(&pool).await;
    Some(pool)
}

/// Empty the canonical tables and drop the test staging schema
pub async fn reset_database(pool: &PgPool) {
    sqlx::query("TRUNCATE bands, albums, tracks, band_aliases RESTART IDENTITY CASCADE")
        .execute(pool)
        .await
        .expect("truncate canonical tables");
    sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", TEST_SCHEMA))
        .execute(pool)
        .await
        .expect("drop test schema");
}

pub async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.expect(sql)
}

pub async fn schema_exists(pool: &PgPool, schema: &str) -> bool {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)")
        .bind(schema)
        .fetch_one(pool)
        .await
        .expect("query schemata")
}

/// Settings for database tests over a fixture directory
pub fn test_config(working_dir: &Path, batch_size: i64) -> IngestConfig {
    IngestConfig {
        working_dir: working_dir.to_path_buf(),
        base_url: "http://127.0.0.1:9".to_string(),
        snapshot: None,
        artist_cap: None,
        batch_size,
        staging_schema: TEST_SCHEMA.to_string(),
        max_redirects: 5,
        top_tags: 5,
        keep_staging: false,
    }
}

/// Deterministic upstream identifier `00000000-0000-4000-8000-<n>`
pub fn mbid(n: u32) -> String {
    format!("00000000-0000-4000-8000-{:012x}", n)
}

pub fn uuid(n: u32) -> uuid::Uuid {
    uuid::Uuid::parse_str(&mbid(n)).expect("valid uuid")
}

/// Flat-file dump written into a temporary working directory.
///
/// Rows are given by column name; unspecified columns are `\N`.
pub struct DumpFixture {
    dir: TempDir,
    rows: BTreeMap<&'static str, Vec<String>>,
}

impl DumpFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
            rows: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn add(&mut self, table: &str, values: &[(&str, &str)]) -> &mut Self {
        let spec = staging_table(table).unwrap_or_else(|| panic!("unknown staging table {}", table));
        for (column, _) in values {
            assert!(
                spec.columns.iter().any(|c| c.name == *column),
                "unknown column {}.{}",
                table,
                column
            );
        }

        let line = spec
            .columns
            .iter()
            .map(|c| {
                values
                    .iter()
                    .find(|(name, _)| *name == c.name)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_else(|| "\\N".to_string())
            })
            .collect::<Vec<_>>()
            .join("\t");

        self.rows.entry(spec.name).or_default().push(line);
        self
    }

    /// Overwrite columns of the row whose `key` column equals `id`
    pub fn update(&mut self, table: &str, key: &str, id: &str, values: &[(&str, &str)]) -> &mut Self {
        let spec = staging_table(table).unwrap_or_else(|| panic!("unknown staging table {}", table));
        let position = |column: &str| {
            spec.columns
                .iter()
                .position(|c| c.name == column)
                .unwrap_or_else(|| panic!("unknown column {}.{}", table, column))
        };
        let key_at = position(key);

        let rows = self.rows.get_mut(spec.name).expect("table has rows");
        let line = rows
            .iter_mut()
            .find(|line| line.split('\t').nth(key_at) == Some(id))
            .unwrap_or_else(|| panic!("no {} row with {} = {}", table, key, id));

        let mut fields: Vec<String> = line.split('\t').map(str::to_string).collect();
        for (column, value) in values {
            fields[position(column)] = value.to_string();
        }
        *line = fields.join("\t");
        self
    }

    /// Write one file per staging table (empty when no rows were added)
    pub fn write(&self) {
        for table in STAGING_TABLES {
            let mut content = String::new();
            for line in self.rows.get(table.name).map(Vec::as_slice).unwrap_or(&[]) {
                content.push_str(line);
                content.push('\n');
            }
            std::fs::write(self.path().join(table.name), content).expect("write flat file");
        }
    }

    pub fn remove(&self, table: &str) {
        std::fs::remove_file(self.path().join(table)).expect("remove flat file");
    }
}

/// A small dump exercising every transform rule.
///
/// - artist 1 "Nirvana" (US, group): recordings with ISRCs, two releases with
///   cover art in release group 10, tags grunge(10) and rock(5), two aliases
/// - artist 2 "Nirvana" (GB): recording with an ISRC, release 2000 without
///   cover art
/// - artist 3 "Silent Partner": recording without an ISRC
/// - recording 101 appears on both releases of group 10
pub fn sample_dump() -> DumpFixture {
    let mut f = DumpFixture::new();

    f.add("area", &[("id", "1"), ("gid", mbid(9001).as_str()), ("name", "United Kingdom")])
        .add("area", &[("id", "2"), ("gid", mbid(9002).as_str()), ("name", "United States")])
        .add("iso_3166_1", &[("area", "1"), ("code", "GB")])
        .add("iso_3166_1", &[("area", "2"), ("code", "US")])
        .add("artist_type", &[("id", "1"), ("name", "Group")])
        .add("artist_type", &[("id", "2"), ("name", "Person")]);

    f.add("artist", &[("id", "1"), ("gid", mbid(1).as_str()), ("name", "Nirvana"), ("sort_name", "Nirvana"), ("type", "1"), ("area", "2")])
        .add("artist", &[("id", "2"), ("gid", mbid(2).as_str()), ("name", "Nirvana"), ("sort_name", "Nirvana"), ("type", "1"), ("begin_area", "1")])
        .add("artist", &[("id", "3"), ("gid", mbid(3).as_str()), ("name", "Silent Partner"), ("sort_name", "Partner, Silent"), ("type", "2")]);

    for id in ["1", "2", "3"] {
        f.add("artist_credit", &[("id", id), ("name", "credit"), ("artist_count", "1")])
            .add("artist_credit_name", &[("artist_credit", id), ("position", "0"), ("artist", id), ("name", "credit"), ("join_phrase", "")]);
    }

    f.add("recording", &[("id", "101"), ("gid", mbid(101).as_str()), ("name", "Smells Like Teen Spirit"), ("artist_credit", "1"), ("length", "301000")])
        .add("recording", &[("id", "102"), ("gid", mbid(102).as_str()), ("name", "In Bloom"), ("artist_credit", "1"), ("length", "254000")])
        .add("recording", &[("id", "201"), ("gid", mbid(201).as_str()), ("name", "Other Song"), ("artist_credit", "2")])
        .add("recording", &[("id", "301"), ("gid", mbid(301).as_str()), ("name", "Quiet Song"), ("artist_credit", "3")])
        .add("isrc", &[("id", "1"), ("recording", "101"), ("isrc", "USGF19942501")])
        .add("isrc", &[("id", "2"), ("recording", "101"), ("isrc", "USGF19942500")])
        .add("isrc", &[("id", "3"), ("recording", "201"), ("isrc", "GBAAA0000001")]);

    f.add("release_group_primary_type", &[("id", "1"), ("name", "Album")])
        .add("release_group_primary_type", &[("id", "2"), ("name", "Single")])
        .add("release_group", &[("id", "10"), ("gid", mbid(10).as_str()), ("name", "Nevermind"), ("artist_credit", "1"), ("type", "1")])
        .add("release_group", &[("id", "20"), ("gid", mbid(20).as_str()), ("name", "Other Single"), ("artist_credit", "2"), ("type", "2")])
        .add("release_group", &[("id", "30"), ("gid", mbid(30).as_str()), ("name", "Quiet Album"), ("artist_credit", "3"), ("type", "1")]);

    f.add("release", &[("id", "1000"), ("gid", mbid(1000).as_str()), ("name", "Nevermind"), ("artist_credit", "1"), ("release_group", "10")])
        .add("release", &[("id", "1001"), ("gid", mbid(1001).as_str()), ("name", "Nevermind (Reissue)"), ("artist_credit", "1"), ("release_group", "10")])
        .add("release", &[("id", "2000"), ("gid", mbid(2000).as_str()), ("name", "Other Single"), ("artist_credit", "2"), ("release_group", "20")])
        .add("release", &[("id", "3000"), ("gid", mbid(3000).as_str()), ("name", "Quiet Album"), ("artist_credit", "3"), ("release_group", "30")])
        .add("release_country", &[("release", "1000"), ("country", "2"), ("date_year", "1991"), ("date_month", "9"), ("date_day", "24")])
        .add("release_country", &[("release", "1001"), ("country", "1"), ("date_year", "2011")])
        .add("release_unknown_country", &[("release", "1001"), ("date_year", "2011"), ("date_month", "9")]);

    f.add("medium", &[("id", "5000"), ("release", "1000"), ("position", "1"), ("track_count", "2")])
        .add("medium", &[("id", "5001"), ("release", "1001"), ("position", "1"), ("track_count", "1")])
        .add("medium", &[("id", "6000"), ("release", "2000"), ("position", "1"), ("track_count", "1")])
        .add("track", &[("id", "1"), ("gid", mbid(70001).as_str()), ("recording", "101"), ("medium", "5000"), ("position", "1"), ("number", "1"), ("name", "Smells Like Teen Spirit"), ("artist_credit", "1")])
        .add("track", &[("id", "2"), ("gid", mbid(70002).as_str()), ("recording", "102"), ("medium", "5000"), ("position", "2"), ("number", "2"), ("name", "In Bloom"), ("artist_credit", "1")])
        .add("track", &[("id", "3"), ("gid", mbid(70003).as_str()), ("recording", "101"), ("medium", "5001"), ("position", "1"), ("number", "1"), ("name", "Smells Like Teen Spirit"), ("artist_credit", "1")])
        .add("track", &[("id", "4"), ("gid", mbid(70004).as_str()), ("recording", "201"), ("medium", "6000"), ("position", "1"), ("number", "1"), ("name", "Other Song"), ("artist_credit", "2")]);

    f.add("artist_alias", &[("id", "1"), ("artist", "1"), ("name", "Nirvana (US)"), ("locale", "en")])
        .add("artist_alias", &[("id", "2"), ("artist", "1"), ("name", "Nirvana (US)")])
        .add("artist_alias", &[("id", "3"), ("artist", "3"), ("name", "Partner")])
        .add("tag", &[("id", "1"), ("name", "grunge")])
        .add("tag", &[("id", "2"), ("name", "rock")])
        .add("artist_tag", &[("artist", "1"), ("tag", "2"), ("count", "5")])
        .add("artist_tag", &[("artist", "1"), ("tag", "1"), ("count", "10")]);

    f.add("cover_art", &[("id", "80001"), ("release", "1000"), ("ordering", "1"), ("mime_type", "image/jpeg")])
        .add("cover_art", &[("id", "80002"), ("release", "1001"), ("ordering", "1"), ("mime_type", "image/jpeg")]);

    f
}
