//! Custom error types for huo.

use thiserror::Error;

/// Errors raised by the four guarded stages of the upgrade pipeline.
///
/// A stage error terminates the pipeline for that request only; the
/// watch loop keeps running.
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// The release artifact is missing, unreadable, or unextractable.
    #[error("staging failed: {0}")]
    Staging(String),

    /// The target's pid query failed or returned garbage.
    #[error("pid query failed ({}): {diagnostic}", exit_code(.code))]
    Locate { code: Option<i32>, diagnostic: String },

    /// Copying the artifact into the target's filesystem view failed,
    /// including the process-gone race between Locate and Inject.
    #[error("artifact injection failed: {0}")]
    Inject(String),

    /// The target's upgrade command exited non-zero.
    #[error("upgrade command failed ({}): {diagnostic}", exit_code(.code))]
    Trigger { code: Option<i32>, diagnostic: String },
}

impl UpgradeError {
    /// Name of the pipeline stage this error belongs to, for logging.
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Staging(_) => "stage",
            Self::Locate { .. } => "locate",
            Self::Inject(_) => "inject",
            Self::Trigger { .. } => "trigger",
        }
    }
}

// None covers both spawn failures and death by signal, so the label
// stays neutral about the cause.
fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |c| format!("exit code {c}"))
}
