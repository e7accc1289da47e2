//! Staging table declarations
//!
//! Each table mirrors one tab-separated dump file. Columns are listed in the
//! exact positional order of the upstream export; COPY relies on it. Types are
//! deliberately loose (no constraints, timestamps as text) so that any row
//! the dump contains loads.

/// One positional column
#[derive(Debug, Clone, Copy)]
pub struct StagingColumn {
    pub name: &'static str,
    pub sql_type: &'static str,
}

/// A staging table and its post-load indexes
#[derive(Debug, Clone, Copy)]
pub struct StagingTable {
    /// Table name, also the flat file name in the working directory
    pub name: &'static str,
    pub columns: &'static [StagingColumn],
    /// Column lists indexed after every table has been loaded
    pub indexes: &'static [&'static str],
}

const fn col(name: &'static str, sql_type: &'static str) -> StagingColumn {
    StagingColumn { name, sql_type }
}

const INT: &str = "INTEGER";
const BIGINT: &str = "BIGINT";
const SMALLINT: &str = "SMALLINT";
const UUID: &str = "UUID";
const TEXT: &str = "TEXT";
const BOOL: &str = "BOOLEAN";

/// Every staging table, in load order
pub const STAGING_TABLES: &[StagingTable] = &[
    StagingTable {
        name: "area",
        columns: &[
            col("id", INT),
            col("gid", UUID),
            col("name", TEXT),
            col("type", INT),
            col("edits_pending", INT),
            col("last_updated", TEXT),
            col("begin_date_year", SMALLINT),
            col("begin_date_month", SMALLINT),
            col("begin_date_day", SMALLINT),
            col("end_date_year", SMALLINT),
            col("end_date_month", SMALLINT),
            col("end_date_day", SMALLINT),
            col("ended", BOOL),
            col("comment", TEXT),
        ],
        indexes: &["id"],
    },
    StagingTable {
        name: "iso_3166_1",
        columns: &[col("area", INT), col("code", TEXT)],
        indexes: &["area"],
    },
    StagingTable {
        name: "artist",
        columns: &[
            col("id", INT),
            col("gid", UUID),
            col("name", TEXT),
            col("sort_name", TEXT),
            col("begin_date_year", SMALLINT),
            col("begin_date_month", SMALLINT),
            col("begin_date_day", SMALLINT),
            col("end_date_year", SMALLINT),
            col("end_date_month", SMALLINT),
            col("end_date_day", SMALLINT),
            col("type", INT),
            col("area", INT),
            col("gender", INT),
            col("comment", TEXT),
            col("edits_pending", INT),
            col("last_updated", TEXT),
            col("ended", BOOL),
            col("begin_area", INT),
            col("end_area", INT),
        ],
        indexes: &["id", "gid"],
    },
    StagingTable {
        name: "artist_type",
        columns: &[
            col("id", INT),
            col("name", TEXT),
            col("parent", INT),
            col("child_order", INT),
            col("description", TEXT),
            col("gid", UUID),
        ],
        indexes: &["id"],
    },
    StagingTable {
        name: "artist_alias",
        columns: &[
            col("id", INT),
            col("artist", INT),
            col("name", TEXT),
            col("locale", TEXT),
            col("edits_pending", INT),
            col("last_updated", TEXT),
            col("type", INT),
            col("sort_name", TEXT),
            col("begin_date_year", SMALLINT),
            col("begin_date_month", SMALLINT),
            col("begin_date_day", SMALLINT),
            col("end_date_year", SMALLINT),
            col("end_date_month", SMALLINT),
            col("end_date_day", SMALLINT),
            col("primary_for_locale", BOOL),
            col("ended", BOOL),
        ],
        indexes: &["artist"],
    },
    StagingTable {
        name: "artist_credit",
        columns: &[
            col("id", INT),
            col("name", TEXT),
            col("artist_count", SMALLINT),
            col("ref_count", INT),
            col("created", TEXT),
            col("edits_pending", INT),
            col("gid", UUID),
        ],
        indexes: &["id"],
    },
    StagingTable {
        name: "artist_credit_name",
        columns: &[
            col("artist_credit", INT),
            col("position", SMALLINT),
            col("artist", INT),
            col("name", TEXT),
            col("join_phrase", TEXT),
        ],
        indexes: &["artist_credit, position", "artist"],
    },
    StagingTable {
        name: "recording",
        columns: &[
            col("id", INT),
            col("gid", UUID),
            col("name", TEXT),
            col("artist_credit", INT),
            col("length", INT),
            col("comment", TEXT),
            col("edits_pending", INT),
            col("last_updated", TEXT),
            col("video", BOOL),
        ],
        indexes: &["id", "artist_credit"],
    },
    StagingTable {
        name: "isrc",
        columns: &[
            col("id", INT),
            col("recording", INT),
            col("isrc", TEXT),
            col("source", SMALLINT),
            col("edits_pending", INT),
            col("created", TEXT),
        ],
        indexes: &["recording"],
    },
    StagingTable {
        name: "release_group",
        columns: &[
            col("id", INT),
            col("gid", UUID),
            col("name", TEXT),
            col("artist_credit", INT),
            col("type", INT),
            col("comment", TEXT),
            col("edits_pending", INT),
            col("last_updated", TEXT),
        ],
        indexes: &["id"],
    },
    StagingTable {
        name: "release_group_primary_type",
        columns: &[
            col("id", INT),
            col("name", TEXT),
            col("parent", INT),
            col("child_order", INT),
            col("description", TEXT),
            col("gid", UUID),
        ],
        indexes: &["id"],
    },
    StagingTable {
        name: "release_group_secondary_type",
        columns: &[
            col("id", INT),
            col("name", TEXT),
            col("parent", INT),
            col("child_order", INT),
            col("description", TEXT),
            col("gid", UUID),
        ],
        indexes: &["id"],
    },
    StagingTable {
        name: "release_group_secondary_type_join",
        columns: &[
            col("release_group", INT),
            col("secondary_type", INT),
            col("created", TEXT),
        ],
        indexes: &["release_group"],
    },
    StagingTable {
        name: "release",
        columns: &[
            col("id", INT),
            col("gid", UUID),
            col("name", TEXT),
            col("artist_credit", INT),
            col("release_group", INT),
            col("status", INT),
            col("packaging", INT),
            col("language", INT),
            col("script", INT),
            col("barcode", TEXT),
            col("comment", TEXT),
            col("edits_pending", INT),
            col("quality", SMALLINT),
            col("last_updated", TEXT),
        ],
        indexes: &["id", "release_group", "artist_credit"],
    },
    StagingTable {
        name: "release_country",
        columns: &[
            col("release", INT),
            col("country", INT),
            col("date_year", SMALLINT),
            col("date_month", SMALLINT),
            col("date_day", SMALLINT),
        ],
        indexes: &["release"],
    },
    StagingTable {
        name: "release_unknown_country",
        columns: &[
            col("release", INT),
            col("date_year", SMALLINT),
            col("date_month", SMALLINT),
            col("date_day", SMALLINT),
        ],
        indexes: &["release"],
    },
    StagingTable {
        name: "medium",
        columns: &[
            col("id", INT),
            col("release", INT),
            col("position", INT),
            col("format", INT),
            col("name", TEXT),
            col("edits_pending", INT),
            col("last_updated", TEXT),
            col("track_count", INT),
        ],
        indexes: &["id", "release"],
    },
    StagingTable {
        name: "track",
        columns: &[
            col("id", INT),
            col("gid", UUID),
            col("recording", INT),
            col("medium", INT),
            col("position", INT),
            col("number", TEXT),
            col("name", TEXT),
            col("artist_credit", INT),
            col("length", INT),
            col("edits_pending", INT),
            col("last_updated", TEXT),
            col("is_data_track", BOOL),
        ],
        indexes: &["recording", "medium"],
    },
    StagingTable {
        name: "tag",
        columns: &[col("id", INT), col("name", TEXT), col("ref_count", INT)],
        indexes: &["id"],
    },
    StagingTable {
        name: "artist_tag",
        columns: &[
            col("artist", INT),
            col("tag", INT),
            col("count", INT),
            col("last_updated", TEXT),
        ],
        indexes: &["artist"],
    },
    StagingTable {
        name: "cover_art",
        columns: &[
            col("id", BIGINT),
            col("release", INT),
            col("comment", TEXT),
            col("edit", INT),
            col("ordering", INT),
            col("date_uploaded", TEXT),
            col("edits_pending", INT),
            col("mime_type", TEXT),
            col("filesize", INT),
            col("thumb_250_filesize", INT),
            col("thumb_500_filesize", INT),
            col("thumb_1200_filesize", INT),
        ],
        indexes: &["release"],
    },
];

/// Look up a staging table by name
pub fn staging_table(name: &str) -> Option<&'static StagingTable> {
    STAGING_TABLES.iter().find(|t| t.name == name)
}

impl StagingTable {
    /// Comma-separated column names in positional order
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_sql(&self, schema: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {}.{} ({})", schema, self.name, columns)
    }

    /// Text-format COPY: tab separated, `\N` for NULL
    pub fn copy_sql(&self, schema: &str) -> String {
        format!(
            "COPY {}.{} ({}) FROM STDIN",
            schema,
            self.name,
            self.column_list()
        )
    }

    pub fn index_sql(&self, schema: &str) -> Vec<String> {
        self.indexes
            .iter()
            .map(|cols| {
                let suffix: String = cols
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| if c == ',' { '_' } else { c })
                    .collect();
                format!(
                    "CREATE INDEX {table}_{suffix}_idx ON {schema}.{table} ({cols})",
                    table = self.name,
                    suffix = suffix,
                    schema = schema,
                    cols = cols
                )
            })
            .collect()
    }
}
