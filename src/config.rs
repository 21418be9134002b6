//! Operator configuration.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

/// Build extended version information
fn build_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const COMMIT: &str = env!("BUILD_COMMIT");
    const BUILD_DATE: &str = env!("BUILD_DATE");

    Box::leak(
        format!(
            "{}\nCommit: {}\nBuild Date: {}",
            VERSION, COMMIT, BUILD_DATE
        )
        .into_boxed_str(),
    )
}

#[derive(Parser, Debug, Clone)]
#[command(name = "huo")]
#[command(author, version, about = "Hot Upgrade Operator", long_about = None)]
#[command(long_version = build_version())]
pub struct Config {
    /// Trusted directory release tarballs are read from. Requests only
    /// contribute a base name; it is always resolved under this root.
    #[arg(
        long = "source-dir",
        env = "UPGRADE_SOURCE_DIR",
        help = "Trusted directory containing release upgrade tarballs"
    )]
    pub source_dir: PathBuf,

    /// Release name; identifies the control script (`bin/<name>`) of the
    /// target application.
    #[arg(
        long = "release-name",
        env = "RELEASE_NAME",
        help = "Name of the release whose control script performs pid/eval"
    )]
    pub release_name: String,

    /// Root directory of the running release inside the target's own
    /// filesystem view (absolute, e.g. /opt/myapp).
    #[arg(
        long = "release-root-dir",
        env = "RELEASE_ROOT_DIR",
        help = "Release root directory inside the target process's filesystem"
    )]
    pub release_root_dir: PathBuf,

    /// Retain scratch directories after each request, for postmortem.
    #[arg(
        long = "keep-scratch",
        env = "KEEP_SCRATCH",
        default_value = "false",
        help = "Keep per-request scratch directories instead of removing them"
    )]
    pub keep_scratch: bool,

    /// Log output format: 'json' or 'text'
    #[arg(
        long = "log-format",
        env = "LOG_FORMAT",
        default_value = "json",
        help = "Log output format: 'json' or 'text'"
    )]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long = "log-level",
        env = "LOG_LEVEL",
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,

    /// Port for the /healthz and /readyz endpoints.
    #[arg(
        long = "health-port",
        env = "HEALTH_PORT",
        default_value = "8080",
        help = "Port for health endpoints"
    )]
    pub health_port: u16,
}

impl Config {
    /// Validate the configuration before watching begins.
    ///
    /// Configuration problems are fatal at startup rather than surfacing
    /// later as per-request stage errors.
    pub fn validate(&self) -> Result<()> {
        if !self.source_dir.is_dir() {
            bail!(
                "source directory {} does not exist or is not a directory",
                self.source_dir.display()
            );
        }
        if self.release_name.is_empty() || self.release_name.contains('/') {
            bail!("invalid release name: {:?}", self.release_name);
        }
        if !self.release_root_dir.is_absolute() {
            bail!(
                "release root directory must be absolute, got {}",
                self.release_root_dir.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(source_dir: PathBuf) -> Config {
        Config {
            source_dir,
            release_name: "myapp".to_string(),
            release_root_dir: PathBuf::from("/opt/myapp"),
            keep_scratch: false,
            log_format: "text".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
        }
    }

    #[test]
    fn test_validate_ok() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(dir.path().to_path_buf());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_source_dir() {
        let config = config_with(PathBuf::from("/does/not/exist"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source directory"));
    }

    #[test]
    fn test_validate_bad_release_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with(dir.path().to_path_buf());
        config.release_name = "bin/evil".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_relative_release_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with(dir.path().to_path_buf());
        config.release_root_dir = PathBuf::from("opt/myapp");
        assert!(config.validate().is_err());
    }
}
