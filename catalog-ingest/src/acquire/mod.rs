//! Archive acquisition
//!
//! Resolves the snapshot to import, downloads each declared archive for that
//! snapshot into the working directory and extracts the member files the
//! staging loader needs. Archives are fetched concurrently; each download
//! keeps its own redirect budget and all share one cancellation token.

pub mod archives;
pub mod download;
pub mod extract;

pub use archives::{ArchiveMember, ArchiveSpec, ARCHIVES};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const USER_AGENT: &str = concat!("catalog-ingest/", env!("CARGO_PKG_VERSION"));

/// Sentinel snapshot name meaning "whatever `LATEST` points to"
pub const LATEST: &str = "latest";

/// Acquisition errors
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Too many redirects fetching {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Redirect without Location header from {0}")]
    MissingLocation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid snapshot name '{0}' (expected YYYYMMDD-HHMMSS)")]
    InvalidSnapshot(String),

    #[error("Download of {url} truncated: expected {expected} bytes, received {received}")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("Extraction of {archive} failed: {reason}")]
    Extraction { archive: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Acquisition cancelled")]
    Cancelled,

    #[error("Acquisition task failed: {0}")]
    Task(String),
}

/// Dated snapshot directory name, `YYYYMMDD-HHMMSS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn parse(raw: &str) -> Result<Self, AcquireError> {
        let name = raw.trim();
        let bytes = name.as_bytes();
        let valid = bytes.len() == 15
            && bytes[..8].iter().all(u8::is_ascii_digit)
            && bytes[8] == b'-'
            && bytes[9..].iter().all(u8::is_ascii_digit);

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(AcquireError::InvalidSnapshot(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened to one archive
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub archive: &'static str,
    /// Bytes downloaded, `None` when the archive was already present
    pub downloaded_bytes: Option<u64>,
    pub extracted: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AcquireReport {
    pub snapshot: Snapshot,
    pub archives: Vec<ArchiveOutcome>,
}

/// Downloads and extracts the snapshot archives
#[derive(Debug, Clone)]
pub struct ArchiveAcquirer {
    client: reqwest::Client,
    base_url: String,
    working_dir: PathBuf,
    max_redirects: usize,
    archives: &'static [ArchiveSpec],
}

impl ArchiveAcquirer {
    /// Redirects are handled by [`download::get_following_redirects`], so the
    /// client itself never follows them. Only connecting is timed out.
    pub fn new(
        base_url: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        max_redirects: usize,
    ) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            working_dir: working_dir.into(),
            max_redirects,
            archives: ARCHIVES,
        })
    }

    /// Replace the archive list
    pub fn with_archives(mut self, archives: &'static [ArchiveSpec]) -> Self {
        self.archives = archives;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// URL of one archive within a snapshot
    pub fn archive_url(&self, snapshot: &Snapshot, archive: &ArchiveSpec) -> String {
        format!("{}/{}/{}", self.base_url, snapshot, archive.file_name)
    }

    /// Resolve the snapshot to import.
    ///
    /// `None` or `latest` (any case) reads the `LATEST` pointer upstream.
    pub async fn resolve_snapshot(&self, requested: Option<&str>) -> Result<Snapshot, AcquireError> {
        match requested.map(str::trim) {
            Some(name) if !name.eq_ignore_ascii_case(LATEST) => Snapshot::parse(name),
            _ => {
                let url = format!("{}/LATEST", self.base_url);
                let response =
                    download::get_following_redirects(&self.client, &url, self.max_redirects).await?;
                let body = response.text().await?;
                let snapshot = Snapshot::parse(&body)?;
                info!(snapshot = %snapshot, "Resolved latest snapshot");
                Ok(snapshot)
            }
        }
    }

    /// Resolve the snapshot, then download and extract every archive.
    ///
    /// All archives run to completion even when one fails. Every failure is
    /// logged; the first one (in archive order) is returned.
    pub async fn acquire(
        &self,
        requested: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AcquireReport, AcquireError> {
        let snapshot = self.resolve_snapshot(requested).await?;
        tokio::fs::create_dir_all(&self.working_dir).await?;

        info!(
            snapshot = %snapshot,
            working_dir = %self.working_dir.display(),
            archives = self.archives.len(),
            "Acquiring archives"
        );

        let mut tasks = JoinSet::new();
        for (index, spec) in self.archives.iter().enumerate() {
            let client = self.client.clone();
            let url = self.archive_url(&snapshot, spec);
            let working_dir = self.working_dir.clone();
            let max_redirects = self.max_redirects;
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let result =
                    acquire_archive(&client, spec, &url, &working_dir, max_redirects, &cancel).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<ArchiveOutcome, AcquireError>>> =
            (0..self.archives.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => {
                    error!("Archive task aborted: {}", e);
                    return Err(AcquireError::Task(e.to_string()));
                }
            }
        }

        let mut outcomes = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (spec, result) in self.archives.iter().zip(results) {
            match result {
                Some(Ok(outcome)) => outcomes.push(outcome),
                Some(Err(e)) => {
                    error!(archive = spec.file_name, error = %e, "Archive acquisition failed");
                    first_error.get_or_insert(e);
                }
                None => {
                    first_error.get_or_insert(AcquireError::Task(format!(
                        "no result for {}",
                        spec.file_name
                    )));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(snapshot = %snapshot, "All archives acquired");
        Ok(AcquireReport {
            snapshot,
            archives: outcomes,
        })
    }
}

/// Download (unless present) and extract one archive
async fn acquire_archive(
    client: &reqwest::Client,
    spec: &'static ArchiveSpec,
    url: &str,
    working_dir: &Path,
    max_redirects: usize,
    cancel: &CancellationToken,
) -> Result<ArchiveOutcome, AcquireError> {
    let archive_path = working_dir.join(spec.file_name);

    let downloaded_bytes = if archive_path.exists() {
        info!(archive = spec.file_name, "Archive already present, skipping download");
        None
    } else {
        Some(download::download_file(client, url, &archive_path, max_redirects, cancel).await?)
    };

    if cancel.is_cancelled() {
        return Err(AcquireError::Cancelled);
    }

    let extracted = extract::extract_members(spec, &archive_path, working_dir).await?;

    Ok(ArchiveOutcome {
        archive: spec.file_name,
        downloaded_bytes,
        extracted,
    })
}
