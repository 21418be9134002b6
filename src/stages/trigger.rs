//! Trigger: instruct the running release to apply the upgrade.

use std::path::Path;

use tracing::debug;

use crate::error::UpgradeError;
use crate::release::ReleaseScript;

/// Ask the target to run its internal upgrade routine against the
/// requested version.
///
/// On success stdout carries the release's version listing, which is
/// returned for logging.
pub async fn execute(
    scratch: &Path,
    release_name: &str,
    target_version: &str,
) -> Result<String, UpgradeError> {
    let expr = format!("os:cmd(\"bin/{release_name} upgrade {target_version}\").");
    debug!(release = release_name, expr = %expr, "Sending upgrade command");

    let script = ReleaseScript::new(scratch, release_name);
    let out = script
        .run(&["eval", &expr])
        .await
        .map_err(|e| UpgradeError::Trigger {
            code: None,
            diagnostic: format!("unable to run control script: {e}"),
        })?;

    if !out.success() {
        return Err(UpgradeError::Trigger {
            code: out.code,
            diagnostic: out.stderr.trim().to_string(),
        });
    }

    Ok(out.stdout)
}
