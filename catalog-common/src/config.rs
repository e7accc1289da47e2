//! Bootstrap configuration loading and working directory resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`DATABASE_URL`, `CATALOG_WORKING_DIR`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the PostgreSQL connection URL
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable naming the working directory for archives and flat files
pub const WORKING_DIR_ENV: &str = "CATALOG_WORKING_DIR";

/// Default upstream location of the full-export snapshots
pub const DEFAULT_BASE_URL: &str = "https://data.metabrainz.org/pub/musicbrainz/data/fullexport";

/// Default staging schema name
pub const DEFAULT_STAGING_SCHEMA: &str = "musicbrainz_staging";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub database_url: Option<String>,

    /// Directory holding downloaded archives and extracted flat files
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ingestion pipeline settings
    #[serde(default)]
    pub ingest: IngestSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Ingestion pipeline settings (`[ingest]` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Upstream host serving `LATEST` and the dated snapshot directories
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Explicit snapshot name, or `latest`
    #[serde(default)]
    pub snapshot: Option<String>,

    /// Cap on the qualifying-artist set (sampling and test runs)
    #[serde(default)]
    pub artist_cap: Option<i64>,

    /// Rows per transform batch
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Staging schema name
    #[serde(default = "default_staging_schema")]
    pub staging_schema: String,

    /// Redirect hops allowed per download
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Number of tags kept as a band's genre list
    #[serde(default = "default_top_tags")]
    pub top_tags: i64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            snapshot: None,
            artist_cap: None,
            batch_size: default_batch_size(),
            staging_schema: default_staging_schema(),
            max_redirects: default_max_redirects(),
            top_tags: default_top_tags(),
        }
    }
}

impl IngestSettings {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size < 1 {
            return Err(Error::Config(format!(
                "batch_size must be at least 1 (got {})",
                self.batch_size
            )));
        }
        if self.max_redirects < 1 {
            return Err(Error::Config("max_redirects must be at least 1".to_string()));
        }
        if self.top_tags < 1 {
            return Err(Error::Config(format!(
                "top_tags must be at least 1 (got {})",
                self.top_tags
            )));
        }
        if let Some(cap) = self.artist_cap {
            if cap < 1 {
                return Err(Error::Config(format!("artist_cap must be positive (got {})", cap)));
            }
        }
        validate_identifier(&self.staging_schema)?;
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_batch_size() -> i64 {
    10_000
}

fn default_staging_schema() -> String {
    DEFAULT_STAGING_SCHEMA.to_string()
}

fn default_max_redirects() -> usize {
    5
}

fn default_top_tags() -> i64 {
    5
}

/// Check that a schema name is a plain lower-case SQL identifier.
///
/// Schema names are spliced into DDL, so anything outside
/// `[a-z_][a-z0-9_]*` (max 63 bytes) is refused.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "'{}' is not a valid schema identifier (expected [a-z_][a-z0-9_]*, max 63 bytes)",
            name
        )))
    }
}

/// Default configuration file path: `<config_dir>/catalog-ingest/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catalog-ingest").join("config.toml"))
}

/// Load the TOML bootstrap configuration.
///
/// A missing file yields defaults with a warning; an unreadable or malformed
/// file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the working directory: CLI → `CATALOG_WORKING_DIR` → TOML → default.
pub fn resolve_working_dir(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(WORKING_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.working_dir {
        return path.clone();
    }

    default_working_dir()
}

/// Resolve the database URL: CLI → `DATABASE_URL` → TOML.
pub fn resolve_database_url(cli_arg: Option<&str>, toml: &TomlConfig) -> Result<String> {
    if let Some(url) = cli_arg {
        return Ok(url.to_string());
    }

    if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
        if !url.trim().is_empty() {
            return Ok(url);
        }
    }

    toml.database_url.clone().ok_or_else(|| {
        Error::Config(format!(
            "Database URL not configured. Use --database-url, {} or `database_url` in the TOML config",
            DATABASE_URL_ENV
        ))
    })
}

/// OS-dependent default working directory
fn default_working_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("catalog-ingest"))
        .unwrap_or_else(|| PathBuf::from("./catalog_ingest_data"))
}
