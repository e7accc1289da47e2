//! # Catalog Common Library
//!
//! Shared code for the catalog ingestion tooling:
//! - Error type used by the database-facing layers
//! - Bootstrap configuration (TOML + environment resolution)
//! - Logging initialization
//! - Canonical Band / Album / Track / BandAlias schema and models

pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
