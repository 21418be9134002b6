//! Invocation of the target release's control script.
//!
//! Every staged release ships a control script at `bin/<release>` that
//! speaks a small synchronous protocol: `pid` reports the running node's
//! OS process id, `eval <expr>` evaluates an expression inside the node.
//! Non-zero exit means the operation failed and stderr carries the
//! diagnostic.

use std::io;
use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Handle on the control script of a staged release.
pub struct ReleaseScript {
    script: PathBuf,
    workdir: PathBuf,
}

/// Captured result of one control script invocation.
pub struct ScriptOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl ReleaseScript {
    /// The control script of the release extracted under `scratch`.
    pub fn new(scratch: &Path, release_name: &str) -> Self {
        Self {
            script: scratch.join("bin").join(release_name),
            workdir: scratch.to_path_buf(),
        }
    }

    /// Run the script with the given arguments, capturing output.
    ///
    /// The working directory is the scratch root so the script resolves
    /// its own relative paths the same way the release does.
    pub async fn run(&self, args: &[&str]) -> io::Result<ScriptOutput> {
        let output = Command::new(&self.script)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await?;

        Ok(ScriptOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
