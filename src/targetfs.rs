//! Access to the target process's filesystem view.
//!
//! On Linux the root filesystem of another process is reachable through
//! `/proc/<pid>/root`, which is how the artifact gets delivered using the
//! target's own relative path conventions. The capability is behind a
//! trait so tests (and platforms with a non-standard procfs mount) can
//! substitute their own resolution.

use std::path::{Path, PathBuf};

/// Resolves a process identifier to the root of that process's own
/// filesystem view.
pub trait TargetFilesystem: Send + Sync {
    fn root_of(&self, pid: u32) -> PathBuf;
}

/// procfs-backed resolution: `<base>/<pid>/root`.
pub struct ProcFilesystem {
    base: PathBuf,
}

impl ProcFilesystem {
    pub fn new() -> Self {
        Self::with_base("/proc")
    }

    /// Use a procfs mounted somewhere other than `/proc`.
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }
}

impl Default for ProcFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetFilesystem for ProcFilesystem {
    fn root_of(&self, pid: u32) -> PathBuf {
        self.base.join(pid.to_string()).join("root")
    }
}
