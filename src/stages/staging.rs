//! Staging: copy the release tarball into a scratch directory and
//! extract it in place.

use std::fs;
use std::path::Path;

use flate2::read::GzDecoder;
use tempfile::TempDir;
use tracing::debug;

use crate::error::UpgradeError;

/// A release staged into an isolated scratch directory.
///
/// The scratch directory is removed when this is dropped, unless the
/// orchestrator keeps it for postmortem.
#[derive(Debug)]
pub struct StagedRelease {
    pub scratch: TempDir,
}

impl StagedRelease {
    pub fn path(&self) -> &Path {
        self.scratch.path()
    }
}

/// Extract the artifact base name from the tarball field of a request.
///
/// Requests may carry a full path; only the base name is trusted, and it
/// is always resolved against the configured source directory.
pub fn artifact_name(tarball: &str) -> Result<String, UpgradeError> {
    match Path::new(tarball).file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name.to_string()),
        _ => Err(UpgradeError::Staging(format!(
            "tarball {tarball:?} has no usable base name"
        ))),
    }
}

/// Copy the named tarball from the trusted source directory into a fresh
/// scratch directory and unpack it there.
pub fn execute(source_dir: &Path, tarball: &str) -> Result<StagedRelease, UpgradeError> {
    let scratch = tempfile::Builder::new()
        .prefix("relup-")
        .tempdir()
        .map_err(|e| UpgradeError::Staging(format!("unable to create scratch directory: {e}")))?;

    let src = source_dir.join(tarball);
    let dst = scratch.path().join(tarball);
    fs::copy(&src, &dst).map_err(|e| {
        UpgradeError::Staging(format!(
            "unable to copy {} into scratch: {e}",
            src.display()
        ))
    })?;
    debug!(
        tarball = tarball,
        scratch = %scratch.path().display(),
        "Tarball copied into scratch"
    );

    let file = fs::File::open(&dst)
        .map_err(|e| UpgradeError::Staging(format!("unable to open staged {tarball}: {e}")))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .unpack(scratch.path())
        .map_err(|e| UpgradeError::Staging(format!("unable to extract {tarball}: {e}")))?;
    debug!(tarball = tarball, "Tarball extracted");

    Ok(StagedRelease { scratch })
}
