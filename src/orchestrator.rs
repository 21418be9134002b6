//! Upgrade orchestrator - runs the five-stage pipeline for one request.
//!
//! Stage order is fixed: stage, locate, inject, trigger, cleanup. The
//! first failing stage terminates the pipeline for that request; nothing
//! is retried and already-completed stages are not rolled back. An
//! artifact injected before a trigger failure stays in the target's
//! release directory, where a later attempt overwrites it.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crd::ReleaseUpgrade;
use crate::error::UpgradeError;
use crate::stages;
use crate::targetfs::TargetFilesystem;

/// Stage the pipeline has reached for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStage {
    Received,
    Staged,
    Located,
    Injected,
    Triggered,
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "Received"),
            Self::Staged => write!(f, "Staged"),
            Self::Located => write!(f, "Located"),
            Self::Injected => write!(f, "Injected"),
            Self::Triggered => write!(f, "Triggered"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Transient per-request execution state, owned by the orchestrator for
/// the lifetime of the request and dropped afterwards.
struct UpgradeExecution {
    stage: ExecutionStage,
    scratch: Option<tempfile::TempDir>,
    pid: Option<u32>,
}

impl UpgradeExecution {
    fn new() -> Self {
        Self {
            stage: ExecutionStage::Received,
            scratch: None,
            pid: None,
        }
    }

    fn advance(&mut self, stage: ExecutionStage) {
        debug!(from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
    }
}

/// Result of one completed upgrade request.
#[derive(Debug)]
pub struct UpgradeOutcome {
    pub pid: u32,
    /// Version listing reported by the release after the upgrade.
    pub versions: String,
    /// Scratch directory path (removed unless keep-scratch is set).
    pub scratch: PathBuf,
}

/// Sequences the pipeline stages for one request at a time.
pub struct Orchestrator {
    config: Arc<Config>,
    target_fs: Arc<dyn TargetFilesystem>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, target_fs: Arc<dyn TargetFilesystem>) -> Self {
        Self { config, target_fs }
    }

    /// Process one upgrade request through the full pipeline.
    ///
    /// The scratch directory is cleaned up on success and failure alike;
    /// cleanup problems are logged, never escalated.
    pub async fn process(&self, upgrade: &ReleaseUpgrade) -> Result<UpgradeOutcome, UpgradeError> {
        let name = upgrade.metadata.name.as_deref().unwrap_or("unknown");
        let spec = &upgrade.spec;
        info!(
            name = name,
            deployment = %spec.deployment.name,
            tarball = %spec.relup.tarball,
            from = %spec.relup.source_version,
            to = %spec.relup.target_version,
            "Processing release upgrade request"
        );

        let mut exec = UpgradeExecution::new();
        let result = self.run_stages(&mut exec, upgrade).await;
        let scratch = self.cleanup(&mut exec);

        match result {
            Ok(versions) => {
                exec.advance(ExecutionStage::Completed);
                let pid = exec.pid.unwrap_or_default();
                info!(
                    name = name,
                    pid = pid,
                    versions = %versions.trim(),
                    "Release upgrade completed"
                );
                Ok(UpgradeOutcome {
                    pid,
                    versions,
                    scratch: scratch.unwrap_or_default(),
                })
            }
            Err(e) => {
                exec.advance(ExecutionStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        exec: &mut UpgradeExecution,
        upgrade: &ReleaseUpgrade,
    ) -> Result<String, UpgradeError> {
        let spec = &upgrade.spec;
        let tarball = stages::staging::artifact_name(&spec.relup.tarball)?;

        let staged = stages::staging::execute(&self.config.source_dir, &tarball)?;
        let scratch_path = staged.path().to_path_buf();
        info!(tarball = %tarball, scratch = %scratch_path.display(), "Release staged");
        exec.scratch = Some(staged.scratch);
        exec.advance(ExecutionStage::Staged);

        let pid = stages::locate::execute(&scratch_path, &self.config.release_name).await?;
        info!(release = %self.config.release_name, pid = pid, "Target process located");
        exec.pid = Some(pid);
        exec.advance(ExecutionStage::Located);

        let dest = stages::inject::execute(
            self.target_fs.as_ref(),
            pid,
            &self.config.source_dir,
            &self.config.release_root_dir,
            &tarball,
        )?;
        info!(dest = %dest.display(), "Artifact injected into target filesystem");
        exec.advance(ExecutionStage::Injected);

        let versions = stages::trigger::execute(
            &scratch_path,
            &self.config.release_name,
            &spec.relup.target_version,
        )
        .await?;
        exec.advance(ExecutionStage::Triggered);

        Ok(versions)
    }

    /// Remove (or retain, with `--keep-scratch`) the scratch directory.
    fn cleanup(&self, exec: &mut UpgradeExecution) -> Option<PathBuf> {
        let scratch = exec.scratch.take()?;
        let path = scratch.path().to_path_buf();
        if self.config.keep_scratch {
            let kept = scratch.keep();
            info!(scratch = %kept.display(), "Scratch directory retained");
        } else if let Err(e) = scratch.close() {
            warn!(scratch = %path.display(), error = %e, "Failed to remove scratch directory");
        }
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DeploymentRef, ReleaseUpgradeSpec, RelupSpec, VolumeSpec};
    use crate::stages::fixtures;
    use crate::targetfs::ProcFilesystem;
    use std::fs;
    use std::path::Path;

    const PID: u32 = 4242;

    fn make_config(source_dir: &Path, keep_scratch: bool) -> Arc<Config> {
        Arc::new(Config {
            source_dir: source_dir.to_path_buf(),
            release_name: "myapp".to_string(),
            release_root_dir: PathBuf::from("/opt/myapp"),
            keep_scratch,
            log_format: "text".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
        })
    }

    /// Fake procfs with `<base>/<PID>/root/opt/myapp/releases` in place.
    fn make_target(base: &Path) -> Arc<ProcFilesystem> {
        fs::create_dir_all(releases_dir(base)).unwrap();
        Arc::new(ProcFilesystem::with_base(base))
    }

    fn releases_dir(base: &Path) -> PathBuf {
        base.join(PID.to_string()).join("root/opt/myapp/releases")
    }

    fn request() -> ReleaseUpgrade {
        ReleaseUpgrade::new(
            "relup-0-1-13-0-1-14",
            ReleaseUpgradeSpec {
                deployment: DeploymentRef {
                    name: "simple-web-service".to_string(),
                },
                relup: RelupSpec {
                    name: "relup-0-1-13-0-1-14-img".to_string(),
                    image: "myapp-relup:0.1.14".to_string(),
                    tarball: "/srv/upgrade/myapp-0.1.14.tar.gz".to_string(),
                    source_version: "0.1.13".to_string(),
                    target_version: "0.1.14".to_string(),
                },
                volume: VolumeSpec {
                    host_path: "/tmp/myapp-upgrades".to_string(),
                },
            },
        )
    }

    /// Control script that reports PID and accepts the upgrade, touching
    /// a marker file per subcommand so tests can assert what ran.
    fn responsive_script(marker_dir: &Path) -> String {
        format!(
            r#"case "$1" in
  pid) touch {dir}/pid_called; echo {PID} ;;
  eval) touch {dir}/eval_called; echo '["0.1.13","0.1.14"]' ;;
  *) exit 9 ;;
esac"#,
            dir = marker_dir.display()
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_pipeline_completes_and_cleans_scratch() {
        let source = tempfile::tempdir().unwrap();
        let markers = tempfile::tempdir().unwrap();
        let proc_base = tempfile::tempdir().unwrap();
        fixtures::make_release_tarball(
            source.path(),
            "myapp-0.1.14.tar.gz",
            "myapp",
            &responsive_script(markers.path()),
        );

        let orchestrator = Orchestrator::new(
            make_config(source.path(), false),
            make_target(proc_base.path()),
        );
        let outcome = orchestrator.process(&request()).await.unwrap();

        assert_eq!(outcome.pid, PID);
        assert!(outcome.versions.contains("0.1.14"));
        assert!(!outcome.scratch.exists(), "scratch must be removed");
        assert!(
            releases_dir(proc_base.path())
                .join("myapp-0.1.14.tar.gz")
                .is_file()
        );
        assert!(markers.path().join("pid_called").exists());
        assert!(markers.path().join("eval_called").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_keep_scratch_retains_directory() {
        let source = tempfile::tempdir().unwrap();
        let markers = tempfile::tempdir().unwrap();
        let proc_base = tempfile::tempdir().unwrap();
        fixtures::make_release_tarball(
            source.path(),
            "myapp-0.1.14.tar.gz",
            "myapp",
            &responsive_script(markers.path()),
        );

        let orchestrator = Orchestrator::new(
            make_config(source.path(), true),
            make_target(proc_base.path()),
        );
        let outcome = orchestrator.process(&request()).await.unwrap();

        assert!(outcome.scratch.exists(), "scratch must be retained");
        fs::remove_dir_all(&outcome.scratch).unwrap();
    }

    #[tokio::test]
    async fn test_missing_artifact_halts_before_locate() {
        let source = tempfile::tempdir().unwrap();
        let proc_base = tempfile::tempdir().unwrap();

        let orchestrator = Orchestrator::new(
            make_config(source.path(), false),
            make_target(proc_base.path()),
        );
        let err = orchestrator.process(&request()).await.unwrap_err();

        assert!(matches!(err, UpgradeError::Staging(_)));
        assert_eq!(err.stage(), "stage");
        // nothing was injected
        assert_eq!(
            fs::read_dir(releases_dir(proc_base.path()))
                .unwrap()
                .count(),
            0
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pid_query_failure_skips_inject_and_trigger() {
        let source = tempfile::tempdir().unwrap();
        let markers = tempfile::tempdir().unwrap();
        let proc_base = tempfile::tempdir().unwrap();
        fixtures::make_release_tarball(
            source.path(),
            "myapp-0.1.14.tar.gz",
            "myapp",
            &format!(
                r#"case "$1" in
  pid) echo 'node is not running' >&2; exit 1 ;;
  eval) touch {}/eval_called ;;
esac"#,
                markers.path().display()
            ),
        );

        let orchestrator = Orchestrator::new(
            make_config(source.path(), false),
            make_target(proc_base.path()),
        );
        let err = orchestrator.process(&request()).await.unwrap_err();

        match err {
            UpgradeError::Locate { code, ref diagnostic } => {
                assert_eq!(code, Some(1));
                assert_eq!(diagnostic, "node is not running");
            }
            ref other => panic!("expected Locate error, got {other}"),
        }
        // no injection, no trigger
        assert_eq!(
            fs::read_dir(releases_dir(proc_base.path()))
                .unwrap()
                .count(),
            0
        );
        assert!(!markers.path().join("eval_called").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_gone_before_inject() {
        let source = tempfile::tempdir().unwrap();
        let markers = tempfile::tempdir().unwrap();
        // empty procfs: the pid reported by the script resolves nowhere
        let proc_base = tempfile::tempdir().unwrap();
        fixtures::make_release_tarball(
            source.path(),
            "myapp-0.1.14.tar.gz",
            "myapp",
            &responsive_script(markers.path()),
        );

        let orchestrator = Orchestrator::new(
            make_config(source.path(), false),
            Arc::new(ProcFilesystem::with_base(proc_base.path())),
        );
        let err = orchestrator.process(&request()).await.unwrap_err();

        assert!(matches!(err, UpgradeError::Inject(_)));
        assert!(!markers.path().join("eval_called").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_trigger_failure_leaves_artifact_injected() {
        let source = tempfile::tempdir().unwrap();
        let proc_base = tempfile::tempdir().unwrap();
        fixtures::make_release_tarball(
            source.path(),
            "myapp-0.1.14.tar.gz",
            "myapp",
            &format!(
                r#"case "$1" in
  pid) echo {PID} ;;
  eval) echo 'relup failed' >&2; exit 1 ;;
esac"#
            ),
        );

        let orchestrator = Orchestrator::new(
            make_config(source.path(), false),
            make_target(proc_base.path()),
        );
        let err = orchestrator.process(&request()).await.unwrap_err();

        assert!(matches!(err, UpgradeError::Trigger { code: Some(1), .. }));
        // artifact persists in the target's release directory and must be
        // safe to encounter on a later attempt
        assert!(
            releases_dir(proc_base.path())
                .join("myapp-0.1.14.tar.gz")
                .is_file()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_redelivered_request_runs_again_without_crashing() {
        let source = tempfile::tempdir().unwrap();
        let markers = tempfile::tempdir().unwrap();
        let proc_base = tempfile::tempdir().unwrap();
        fixtures::make_release_tarball(
            source.path(),
            "myapp-0.1.14.tar.gz",
            "myapp",
            &responsive_script(markers.path()),
        );

        let orchestrator = Orchestrator::new(
            make_config(source.path(), false),
            make_target(proc_base.path()),
        );
        let req = request();
        orchestrator.process(&req).await.unwrap();
        // second delivery of the same request re-runs the pipeline; the
        // injection overwrites and the outcome is again reported by the
        // release itself
        orchestrator.process(&req).await.unwrap();
    }

    #[test]
    fn test_execution_stage_display() {
        assert_eq!(ExecutionStage::Received.to_string(), "Received");
        assert_eq!(ExecutionStage::Staged.to_string(), "Staged");
        assert_eq!(ExecutionStage::Located.to_string(), "Located");
        assert_eq!(ExecutionStage::Injected.to_string(), "Injected");
        assert_eq!(ExecutionStage::Triggered.to_string(), "Triggered");
        assert_eq!(ExecutionStage::Completed.to_string(), "Completed");
        assert_eq!(ExecutionStage::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_execution_advances() {
        let mut exec = UpgradeExecution::new();
        assert_eq!(exec.stage, ExecutionStage::Received);
        exec.advance(ExecutionStage::Staged);
        assert_eq!(exec.stage, ExecutionStage::Staged);
    }
}
