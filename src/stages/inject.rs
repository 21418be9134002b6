//! Inject: copy the original tarball into the target process's own
//! filesystem view so the release can find it under its relative
//! `releases/` convention.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::UpgradeError;
use crate::targetfs::TargetFilesystem;

/// Copy the unextracted tarball from the trusted source directory into
/// `<target root>/<release root, made relative>/releases/`.
///
/// The pid was resolved in an earlier stage and can be stale by now; the
/// destination is re-validated here so a vanished process surfaces as a
/// normal inject error. The copy overwrites any previous injection of
/// the same artifact.
pub fn execute(
    target_fs: &dyn TargetFilesystem,
    pid: u32,
    source_dir: &Path,
    release_root: &Path,
    tarball: &str,
) -> Result<PathBuf, UpgradeError> {
    let root = target_fs.root_of(pid);
    let relative_root = release_root.strip_prefix("/").unwrap_or(release_root);
    let releases_dir = root.join(relative_root).join("releases");

    if !releases_dir.is_dir() {
        return Err(UpgradeError::Inject(format!(
            "release directory {} is not accessible; target process {pid} may have exited",
            releases_dir.display()
        )));
    }

    let dest = releases_dir.join(tarball);
    fs::copy(source_dir.join(tarball), &dest).map_err(|e| {
        UpgradeError::Inject(format!(
            "unable to copy {tarball} into {}: {e}",
            releases_dir.display()
        ))
    })?;
    debug!(pid = pid, dest = %dest.display(), "Tarball injected into target filesystem");

    Ok(dest)
}
