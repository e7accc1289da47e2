//! Configuration loading and resolution tests
//!
//! Tests that manipulate CATALOG_WORKING_DIR or DATABASE_URL are marked
//! #[serial] so they never run in parallel with each other.

use catalog_common::config::{
    load_toml_config, resolve_database_url, resolve_working_dir, TomlConfig, DATABASE_URL_ENV,
    DEFAULT_BASE_URL, WORKING_DIR_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_config_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();

    assert!(config.database_url.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.ingest.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.ingest.batch_size, 10_000);
    assert!(config.ingest.artist_cap.is_none());
}

#[test]
fn test_partial_config_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
database_url = "postgres://localhost/catalog"
working_dir = "/srv/mbdump"

[logging]
level = "debug"

[ingest]
batch_size = 500
artist_cap = 1000
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/catalog"));
    assert_eq!(config.working_dir, Some(PathBuf::from("/srv/mbdump")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.ingest.batch_size, 500);
    assert_eq!(config.ingest.artist_cap, Some(1000));
    assert_eq!(config.ingest.max_redirects, 5);
    assert!(config.ingest.validate().is_ok());
}

#[test]
fn test_malformed_config_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[ingest\nbatch_size = ").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_working_dir_priority() {
    let toml = TomlConfig {
        working_dir: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    env::set_var(WORKING_DIR_ENV, "/from/env");
    assert_eq!(
        resolve_working_dir(Some(Path::new("/from/cli")), &toml),
        PathBuf::from("/from/cli")
    );
    assert_eq!(resolve_working_dir(None, &toml), PathBuf::from("/from/env"));

    env::remove_var(WORKING_DIR_ENV);
    assert_eq!(resolve_working_dir(None, &toml), PathBuf::from("/from/toml"));

    let fallback = resolve_working_dir(None, &TomlConfig::default());
    assert!(!fallback.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_database_url_priority() {
    let toml = TomlConfig {
        database_url: Some("postgres://toml/db".to_string()),
        ..TomlConfig::default()
    };

    env::set_var(DATABASE_URL_ENV, "postgres://env/db");
    assert_eq!(
        resolve_database_url(Some("postgres://cli/db"), &toml).unwrap(),
        "postgres://cli/db"
    );
    assert_eq!(resolve_database_url(None, &toml).unwrap(), "postgres://env/db");

    env::remove_var(DATABASE_URL_ENV);
    assert_eq!(resolve_database_url(None, &toml).unwrap(), "postgres://toml/db");
    assert!(resolve_database_url(None, &TomlConfig::default()).is_err());
}
