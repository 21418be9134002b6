//! Watch loop - consumes `ReleaseUpgrade` change events and dispatches
//! newly created requests to the orchestrator, one at a time.

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use kube::Api;
use kube::runtime::watcher::{Config as WatcherConfig, Event, watcher};
use tracing::{debug, error, info};

use crate::crd::ReleaseUpgrade;
use crate::orchestrator::Orchestrator;

/// Tracks which requests have already been dispatched.
///
/// The watcher reports both creations and later modifications as `Apply`
/// events; recording UIDs makes dispatch creation-only. The set is not
/// persisted: after a restart a still-present request is redelivered as
/// a creation and processed again, and the release's own refusal of an
/// already-applied upgrade surfaces as a per-request trigger error.
#[derive(Default)]
struct SeenRequests {
    uids: HashSet<String>,
}

impl SeenRequests {
    /// Record the request; true only on first observation.
    fn first_observation(&mut self, upgrade: &ReleaseUpgrade) -> bool {
        let key = upgrade
            .metadata
            .uid
            .clone()
            .or_else(|| upgrade.metadata.name.clone())
            .unwrap_or_default();
        self.uids.insert(key)
    }
}

/// Single consumer of the `ReleaseUpgrade` event stream.
pub struct WatchLoop {
    api: Api<ReleaseUpgrade>,
    orchestrator: Orchestrator,
    seen: SeenRequests,
}

impl WatchLoop {
    pub fn new(api: Api<ReleaseUpgrade>, orchestrator: Orchestrator) -> Self {
        Self {
            api,
            orchestrator,
            seen: SeenRequests::default(),
        }
    }

    /// Run until the watch stream fails.
    ///
    /// A stream error is fatal to the process; reconnect policy belongs
    /// to the deployment layer. Requests are processed strictly
    /// sequentially: the loop awaits the orchestrator before polling the
    /// stream again.
    pub async fn run(mut self) -> Result<()> {
        let mut stream = watcher(self.api.clone(), WatcherConfig::default()).boxed();
        info!("Watching for ReleaseUpgrade events");

        while let Some(event) = stream.next().await {
            match event.context("ReleaseUpgrade watch stream failed")? {
                Event::Apply(upgrade) | Event::InitApply(upgrade) => {
                    self.handle_created(upgrade).await;
                }
                Event::Delete(upgrade) => {
                    debug!(
                        name = upgrade.metadata.name.as_deref().unwrap_or("unknown"),
                        "ReleaseUpgrade deleted, ignoring"
                    );
                }
                Event::Init => debug!("Watch initial sync started"),
                Event::InitDone => debug!("Watch initial sync complete"),
            }
        }

        bail!("ReleaseUpgrade watch stream ended unexpectedly")
    }

    async fn handle_created(&mut self, upgrade: ReleaseUpgrade) {
        let name = upgrade.metadata.name.as_deref().unwrap_or("unknown");

        if !self.seen.first_observation(&upgrade) {
            debug!(name = name, "Request already observed, ignoring");
            return;
        }

        info!(
            name = name,
            uid = upgrade.metadata.uid.as_deref().unwrap_or(""),
            "ReleaseUpgrade created"
        );

        // a stage failure aborts this request only; the loop keeps going
        if let Err(e) = self.orchestrator.process(&upgrade).await {
            error!(
                name = name,
                stage = e.stage(),
                error = %e,
                "Release upgrade failed"
            );
        }
    }
}
