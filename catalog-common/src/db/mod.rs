//! Canonical catalog database access

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
