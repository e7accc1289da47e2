//! # Catalog Ingest
//!
//! Imports the MusicBrainz full-export dump into the canonical
//! Band / Album / Track / BandAlias tables:
//!
//! 1. [`acquire`]: resolve the snapshot, download and extract archives
//! 2. [`staging`]: COPY the flat files into a disposable staging schema
//! 3. [`qualifying`]: narrow to artists with ISRCs and releases with cover art
//! 4. [`transform`]: batched, idempotent upserts into the canonical tables
//! 5. [`cleanup`]: drop the staging schema
//!
//! [`pipeline`] chains them; the `catalog-ingest` binary exposes each step.

pub mod acquire;
pub mod cleanup;
pub mod config;
pub mod pipeline;
pub mod qualifying;
pub mod staging;
pub mod transform;

pub use acquire::{AcquireError, AcquireReport, ArchiveAcquirer, Snapshot};
pub use cleanup::teardown;
pub use config::{CliOverrides, IngestConfig};
pub use pipeline::{acquire, run_pipeline, run_transform, PipelineReport, TransformReport};
pub use qualifying::{build_qualifying_sets, QualifyingSets};
pub use staging::{load_staging, StagingReport};
pub use transform::{Stage, StageReport, TransformEngine};
