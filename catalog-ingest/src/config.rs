//! Resolved pipeline settings
//!
//! Merges command-line overrides over the TOML `[ingest]` settings. The
//! database URL is resolved separately since `fetch` never needs one.

use catalog_common::config::{resolve_working_dir, TomlConfig};
use catalog_common::Result;
use std::path::PathBuf;

/// Values given on the command line, each overriding its TOML counterpart
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub working_dir: Option<PathBuf>,
    pub snapshot: Option<String>,
    pub artist_cap: Option<i64>,
    pub batch_size: Option<i64>,
    pub keep_staging: bool,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub working_dir: PathBuf,
    pub base_url: String,
    pub snapshot: Option<String>,
    pub artist_cap: Option<i64>,
    pub batch_size: i64,
    pub staging_schema: String,
    pub max_redirects: usize,
    pub top_tags: i64,
    /// Leave the staging schema in place after `run`
    pub keep_staging: bool,
}

impl IngestConfig {
    pub fn resolve(toml: &TomlConfig, cli: &CliOverrides) -> Result<Self> {
        let mut settings = toml.ingest.clone();
        if let Some(snapshot) = &cli.snapshot {
            settings.snapshot = Some(snapshot.clone());
        }
        if let Some(cap) = cli.artist_cap {
            settings.artist_cap = Some(cap);
        }
        if let Some(batch_size) = cli.batch_size {
            settings.batch_size = batch_size;
        }
        settings.validate()?;

        Ok(Self {
            working_dir: resolve_working_dir(cli.working_dir.as_deref(), toml),
            base_url: settings.base_url,
            snapshot: settings.snapshot,
            artist_cap: settings.artist_cap,
            batch_size: settings.batch_size,
            staging_schema: settings.staging_schema,
            max_redirects: settings.max_redirects,
            top_tags: settings.top_tags,
            keep_staging: cli.keep_staging,
        })
    }
}
