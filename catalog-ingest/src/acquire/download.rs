//! Streaming HTTP download with manual redirect handling
//!
//! Bytes go to a `.partial` sibling that is renamed over the destination only
//! after the body has been fully received and synced.

use super::AcquireError;
use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, Url};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Progress is reported each time another 5% of the body has arrived
const PROGRESS_STEP_PERCENT: u64 = 5;

/// Coarse progress tracker driven by `Content-Length`
#[derive(Debug)]
pub struct DownloadProgress {
    total: Option<u64>,
    received: u64,
    last_step: u64,
}

impl DownloadProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            received: 0,
            last_step: 0,
        }
    }

    /// Record `bytes` more; returns the new percentage when a 5% step is crossed
    pub fn advance(&mut self, bytes: u64) -> Option<u64> {
        self.received += bytes;
        let total = self.total?;

        let percent = self.received.min(total) * 100 / total;
        let step = percent / PROGRESS_STEP_PERCENT * PROGRESS_STEP_PERCENT;
        if step > self.last_step {
            self.last_step = step;
            Some(step)
        } else {
            None
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}

/// `<dest>.partial`
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

/// GET `url`, following at most `max_redirects` redirects.
///
/// Returns the first non-redirect response; non-success statuses are errors.
pub async fn get_following_redirects(
    client: &Client,
    url: &str,
    max_redirects: usize,
) -> Result<Response, AcquireError> {
    let mut current = Url::parse(url).map_err(|e| AcquireError::InvalidUrl(format!("{}: {}", url, e)))?;
    let mut hops = 0usize;

    loop {
        let response = client.get(current.clone()).send().await?;
        let status = response.status();

        if status.is_redirection() {
            if hops >= max_redirects {
                return Err(AcquireError::TooManyRedirects {
                    url: url.to_string(),
                    limit: max_redirects,
                });
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AcquireError::MissingLocation(current.to_string()))?;
            let next = current
                .join(location)
                .map_err(|e| AcquireError::InvalidUrl(format!("{}: {}", location, e)))?;

            hops += 1;
            debug!(from = %current, to = %next, hops, "Following redirect");
            current = next;
            continue;
        }

        if !status.is_success() {
            return Err(AcquireError::HttpStatus {
                url: current.to_string(),
                status: status.as_u16(),
            });
        }

        return Ok(response);
    }
}

/// Download `url` into `dest` through a `.partial` file.
///
/// Returns the number of bytes written.
pub async fn download_file(
    client: &Client,
    url: &str,
    dest: &Path,
    max_redirects: usize,
    cancel: &CancellationToken,
) -> Result<u64, AcquireError> {
    let response = get_following_redirects(client, url, max_redirects).await?;
    let partial = partial_path(dest);

    let mut progress = DownloadProgress::new(response.content_length());
    info!(
        url = %url,
        dest = %dest.display(),
        total_bytes = ?progress.total(),
        "Starting download"
    );

    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return Err(AcquireError::Cancelled);
            }
            chunk = stream.next() => {
                match chunk {
                    Some(chunk) => {
                        let chunk = chunk?;
                        file.write_all(&chunk).await?;
                        if let Some(percent) = progress.advance(chunk.len() as u64) {
                            info!(
                                dest = %dest.display(),
                                percent,
                                bytes = progress.received(),
                                "Download progress"
                            );
                        }
                    }
                    None => break,
                }
            }
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(expected) = progress.total() {
        if progress.received() != expected {
            return Err(AcquireError::Truncated {
                url: url.to_string(),
                expected,
                received: progress.received(),
            });
        }
    }

    tokio::fs::rename(&partial, dest).await?;

    info!(
        dest = %dest.display(),
        bytes = progress.received(),
        "Download complete"
    );
    Ok(progress.received())
}
