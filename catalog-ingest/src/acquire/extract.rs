//! Member extraction from downloaded tarballs
//!
//! Extraction shells out to the system `tar`, which handles bzip2 natively
//! and only writes the members named on its command line.

use super::archives::ArchiveSpec;
use super::AcquireError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Working-directory paths the archive's members end up at
pub fn target_paths(spec: &ArchiveSpec, working_dir: &Path) -> Vec<PathBuf> {
    spec.members
        .iter()
        .map(|m| working_dir.join(m.local_name))
        .collect()
}

/// Extract the declared members of `archive_path` into `working_dir`.
///
/// Skipped entirely when every target file already exists. Returns the
/// target paths.
pub async fn extract_members(
    spec: &ArchiveSpec,
    archive_path: &Path,
    working_dir: &Path,
) -> Result<Vec<PathBuf>, AcquireError> {
    let targets = target_paths(spec, working_dir);
    if targets.iter().all(|p| p.exists()) {
        info!(archive = spec.file_name, "All members already extracted, skipping");
        return Ok(targets);
    }

    info!(
        archive = spec.file_name,
        members = spec.members.len(),
        "Extracting archive members"
    );

    let output = Command::new("tar")
        .arg("-x")
        .arg("-f")
        .arg(archive_path)
        .arg("-C")
        .arg(working_dir)
        .arg(format!("--strip-components={}", spec.strip_components()))
        .args(spec.members.iter().map(|m| m.path))
        .output()
        .await
        .map_err(|e| AcquireError::Extraction {
            archive: spec.file_name.to_string(),
            reason: format!("failed to run tar: {}", e),
        })?;

    if !output.status.success() {
        return Err(AcquireError::Extraction {
            archive: spec.file_name.to_string(),
            reason: format!(
                "tar exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    for member in spec.members {
        let extracted = working_dir.join(member.extracted_name());
        let target = working_dir.join(member.local_name);

        if extracted != target {
            debug!(from = %extracted.display(), to = %target.display(), "Renaming extracted member");
            tokio::fs::rename(&extracted, &target)
                .await
                .map_err(|e| AcquireError::Extraction {
                    archive: spec.file_name.to_string(),
                    reason: format!("rename {} failed: {}", extracted.display(), e),
                })?;
        }

        if !target.exists() {
            return Err(AcquireError::Extraction {
                archive: spec.file_name.to_string(),
                reason: format!("member {} missing after extraction", member.path),
            });
        }
    }

    info!(archive = spec.file_name, "Extraction complete");
    Ok(targets)
}
