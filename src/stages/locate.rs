//! Locate: ask the running release for its own OS process id.

use std::path::Path;

use tracing::debug;

use crate::error::UpgradeError;
use crate::release::ReleaseScript;

/// Query the target's pid through the staged control script.
///
/// stdout carries the pid as a decimal string; anything else, or a
/// non-zero exit, is a locate failure.
pub async fn execute(scratch: &Path, release_name: &str) -> Result<u32, UpgradeError> {
    let script = ReleaseScript::new(scratch, release_name);
    let out = script.run(&["pid"]).await.map_err(|e| UpgradeError::Locate {
        code: None,
        diagnostic: format!("unable to run control script: {e}"),
    })?;

    if !out.success() {
        return Err(UpgradeError::Locate {
            code: out.code,
            diagnostic: out.stderr.trim().to_string(),
        });
    }

    let raw = out.stdout.trim();
    let pid = raw.parse::<u32>().map_err(|_| UpgradeError::Locate {
        code: out.code,
        diagnostic: format!("control script returned non-numeric pid {raw:?}"),
    })?;
    debug!(release = release_name, pid = pid, "Resolved target pid");

    Ok(pid)
}
