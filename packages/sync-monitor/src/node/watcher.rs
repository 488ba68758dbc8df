use std::sync::Arc;

use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lifecycle::{NodeLifecycle, NodeState};
use super::transport::NodeTransport;

/// Method used to check that the node answers at all.
const PROBE_METHOD: &str = "web3_clientVersion";

/// Turns periodic reachability probes into node lifecycle transitions.
pub struct ConnectionWatcher {
    transport: Arc<dyn NodeTransport>,
    lifecycle: NodeLifecycle,
    interval: Duration,
}

impl ConnectionWatcher {
    pub fn new(transport: Arc<dyn NodeTransport>, lifecycle: NodeLifecycle) -> Self {
        Self {
            transport,
            lifecycle,
            interval: Duration::from_secs(5),
        }
    }

    /// Configure how often the node is probed
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Probe until `shutdown` is cancelled.
    ///
    /// Publishes `Starting` first, `Connected` whenever the node becomes
    /// reachable, `Error` when it stops answering, and `Stopping` then `Stopped`
    /// on shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Watching node connectivity every {:?}", self.interval);
        self.lifecycle.transition(NodeState::Starting);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reachable = false;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let now_reachable = self.probe().await;
            match (reachable, now_reachable) {
                (false, true) => self.lifecycle.transition(NodeState::Connected),
                (true, false) => {
                    warn!("Node stopped answering requests");
                    self.lifecycle.transition(NodeState::Error);
                }
                _ => {}
            }
            reachable = now_reachable;
        }

        self.lifecycle.transition(NodeState::Stopping);
        self.lifecycle.transition(NodeState::Stopped);
        info!("Connection watcher stopped");
    }

    async fn probe(&self) -> bool {
        match self.transport.send(PROBE_METHOD, Vec::new()).await {
            Ok(response) => {
                if let Some(version) = response.result.as_ref().and_then(|v| v.as_str()) {
                    debug!(version, "Node answered probe");
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "Node probe failed");
                false
            }
        }
    }
}
