//! huo - Hot Upgrade Operator.
//!
//! Watches `ReleaseUpgrade` CRD resources and performs in-place hot
//! upgrades of a running release: stages the release tarball, locates
//! the live target process, injects the artifact into that process's
//! filesystem view, and triggers the release's own upgrade routine.

mod config;
mod crd;
mod error;
mod health;
mod logging;
mod orchestrator;
mod release;
mod stages;
mod targetfs;
mod watch;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use kube::Api;
use tracing::{error, info};

use config::Config;
use crd::ReleaseUpgrade;
use orchestrator::Orchestrator;
use targetfs::ProcFilesystem;
use watch::WatchLoop;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

#[tokio::main]
async fn main() {
    let config = Config::parse();
    logging::init(&config.log_format, &config.log_level);

    info!(
        "Starting huo v{} (commit: {}, build: {})",
        VERSION, COMMIT, BUILD_DATE
    );

    // Configuration problems are fatal before watching begins.
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    info!(
        source_dir = %config.source_dir.display(),
        release_name = %config.release_name,
        release_root_dir = %config.release_root_dir.display(),
        keep_scratch = config.keep_scratch,
        "Configuration loaded"
    );

    if let Err(e) = run(config).await {
        error!("Operator failed: {}", e);
        std::process::exit(1);
    }
}

/// Main operator loop.
async fn run(config: Config) -> Result<()> {
    // Build in-cluster Kubernetes client
    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Start health server
    let readiness = health::Readiness::new();
    let readiness_clone = readiness.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_port, readiness_clone).await {
            error!("Health server failed: {}", e);
        }
    });

    let config = Arc::new(config);
    let orchestrator = Orchestrator::new(config.clone(), Arc::new(ProcFilesystem::new()));
    let api: Api<ReleaseUpgrade> = Api::all(client);

    // Mark as ready once the watch starts
    readiness.mark_ready();

    WatchLoop::new(api, orchestrator).run().await
}
