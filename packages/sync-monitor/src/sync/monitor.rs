use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::event_bus::{EventBus, EventError, EventReceiver};
use crate::node::{NodeLifecycle, NodeState, NodeTransport, RpcResponse};
use crate::sync::session::SessionResolver;
use crate::sync::{
    BlockFreshness, HeadBlock, Resolution, SkipSignal, SyncError, SyncEvent, SyncOutcome, SyncProgress,
    SyncSession, SyncStatusResult,
};

const SYNC_STATUS_METHOD: &str = "eth_syncing";
const LATEST_BLOCK_METHOD: &str = "eth_getBlockByNumber";

/// Tuning for [`SyncMonitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between poll ticks, also used as the grace delay of `stop()`.
    pub poll_interval: Duration,
    /// Head block age above which a node without sync status is still catching up.
    pub stale_block_threshold: Duration,
    /// Events buffered per slow listener before it starts lagging.
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            stale_block_threshold: Duration::from_secs(60),
            event_capacity: 64,
        }
    }
}

impl MonitorConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_stale_block_threshold(mut self, threshold: Duration) -> Self {
        self.stale_block_threshold = threshold;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// State owned by the monitor for the session currently running.
struct ActiveSession {
    session: SyncSession,
    resolver: SessionResolver,
    skip_listener: JoinHandle<()>,
}

impl ActiveSession {
    fn close(self, resolution: Resolution) {
        self.skip_listener.abort();
        self.resolver.resolve(resolution);
    }
}

/// Watches a node catch up with the network and reports how that ended.
///
/// At most one sync session runs at a time. Each session polls `eth_syncing`
/// on a fixed interval until the node reports it is in sync, the node fails,
/// a skip is requested, or the session is stopped. Node lifecycle transitions
/// restart (`Connected`) or stop (`Stopping`) the running session.
pub struct SyncMonitor {
    transport: Arc<dyn NodeTransport>,
    config: MonitorConfig,
    events: EventBus<SyncEvent>,
    skip: SkipSignal,
    active: Mutex<Option<ActiveSession>>,
    /// Serializes `start()` behind a pending `stop()` grace delay.
    transition: Mutex<()>,
    next_session_id: AtomicU64,
    lifecycle_task: JoinHandle<()>,
}

impl SyncMonitor {
    /// Create the monitor and subscribe it to `lifecycle`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        transport: Arc<dyn NodeTransport>,
        lifecycle: &NodeLifecycle,
        skip: SkipSignal,
        config: MonitorConfig,
    ) -> Arc<Self> {
        let states = lifecycle.subscribe();

        Arc::new_cyclic(|monitor| Self {
            lifecycle_task: tokio::spawn(Self::follow_lifecycle(monitor.clone(), states)),
            transport,
            events: EventBus::new(config.event_capacity),
            config,
            skip,
            active: Mutex::new(None),
            transition: Mutex::new(()),
            next_session_id: AtomicU64::new(0),
        })
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> EventReceiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub async fn current_session(&self) -> Option<SyncSession> {
        self.active.lock().await.as_ref().map(|active| active.session.clone())
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Start a sync session, or return the one already running.
    ///
    /// Fails with [`SyncError::NotConnected`] when the transport is down. Waits
    /// for a `stop()` in progress to finish first.
    pub async fn start(self: &Arc<Self>) -> Result<SyncSession, SyncError> {
        let _transition = self.transition.lock().await;

        if !self.transport.is_connected() {
            warn!("Cannot start sync, node is not connected");
            return Err(SyncError::NotConnected);
        }

        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            warn!(session = current.session.id(), "Sync already running, returning the existing session");
            return Ok(current.session.clone());
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (session, resolver) = SyncSession::open(session_id);
        let skip_listener = tokio::spawn(Self::await_skip(
            Arc::downgrade(self),
            session_id,
            self.skip.subscribe(),
        ));

        *active = Some(ActiveSession {
            session: session.clone(),
            resolver,
            skip_listener,
        });
        info!(session = session_id, "Starting sync");
        self.events.emit(SyncEvent::Starting { session_id });
        drop(active);

        tokio::spawn(Self::drive(Arc::downgrade(self), session_id, self.config.poll_interval));
        Ok(session)
    }

    /// Start a session (or join the running one) and wait for it to end.
    pub async fn run(self: &Arc<Self>) -> Result<SyncOutcome, SyncError> {
        self.start().await?.wait().await
    }

    /// Stop the running session, if any.
    ///
    /// The session is closed immediately; `Stopped` is published one poll
    /// interval later. Does nothing when no session is running.
    pub async fn stop(&self) {
        let _transition = self.transition.lock().await;

        let stopped = self.active.lock().await.take();
        let Some(current) = stopped else {
            debug!("Sync not running, nothing to stop");
            return;
        };

        let session_id = current.session.id();
        info!(session = session_id, "Stopping sync");
        current.close(Resolution::Stopped);

        // An in-flight tick of the old session must land before a restart
        sleep(self.config.poll_interval).await;
        self.events.emit(SyncEvent::Stopped { session_id });
        info!(session = session_id, "Sync stopped");
    }

    /// Resolve the running session as skipped. Returns whether one was running.
    ///
    /// The session is closed before this returns, so a tick still waiting on
    /// the node publishes nothing afterwards.
    pub async fn skip(&self) -> bool {
        let mut active = self.active.lock().await;
        let Some(session_id) = active.as_ref().map(|current| current.session.id()) else {
            debug!("Sync not running, ignoring skip");
            return false;
        };

        info!(session = session_id, "Skipping sync");
        self.resolve_locked(&mut active, session_id, Resolution::Skipped)
    }

    async fn follow_lifecycle(monitor: Weak<Self>, mut states: EventReceiver<NodeState>) {
        loop {
            let state = match states.recv().await {
                Ok(state) => state,
                Err(EventError::Lagged(missed)) => {
                    warn!(missed, "Missed node state transitions");
                    continue;
                }
                Err(EventError::Closed) => break,
            };

            let Some(monitor) = monitor.upgrade() else {
                continue;
            };

            match state {
                NodeState::Stopping => monitor.stop().await,
                NodeState::Connected => {
                    monitor.stop().await;
                    if let Err(e) = monitor.start().await {
                        warn!(error = %e, "Could not start sync after node connected");
                    }
                }
                other => debug!(state = %other, "Ignoring node state"),
            }
        }
        debug!("Node lifecycle feed closed");
    }

    async fn await_skip(monitor: Weak<Self>, session_id: u64, mut skip: EventReceiver<()>) {
        // A lagged receiver still saw a skip
        if let Err(EventError::Closed) = skip.recv().await {
            return;
        }
        if let Some(monitor) = monitor.upgrade() {
            info!(session = session_id, "Skip signal received");
            monitor.resolve(session_id, Resolution::Skipped).await;
        }
    }

    /// Run the poll loop of one session and publish how it ended.
    ///
    /// The loop runs in its own task so a panic still closes the session.
    async fn drive(monitor: Weak<Self>, session_id: u64, poll_interval: Duration) {
        let poll = tokio::spawn(Self::poll(monitor.clone(), session_id, poll_interval));

        let resolution = match poll.await {
            Ok(Some(resolution)) => resolution,
            Ok(None) => return,
            Err(e) => {
                error!(session = session_id, error = %e, "Sync poll task failed");
                Resolution::Errored(SyncError::Aborted(e.to_string()))
            }
        };
        if let Some(monitor) = monitor.upgrade() {
            monitor.resolve(session_id, resolution).await;
        }
    }

    /// `None` when the session was closed from outside or the monitor was
    /// dropped while polling. The monitor is only held for the length of a tick.
    async fn poll(monitor: Weak<Self>, session_id: u64, poll_interval: Duration) -> Option<Resolution> {
        loop {
            sleep(poll_interval).await;

            let Some(monitor) = monitor.upgrade() else {
                debug!(session = session_id, "Sync monitor dropped, leaving poll loop");
                return None;
            };
            if !monitor.is_current(session_id).await {
                debug!(session = session_id, "Sync session closed, leaving poll loop");
                return None;
            }

            match monitor.tick(session_id).await {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => return Some(Resolution::Done),
                Err(e) => {
                    error!(session = session_id, error = %e, "Sync check failed");
                    return Some(Resolution::Errored(e));
                }
            }
        }
    }

    async fn tick(&self, session_id: u64) -> Result<ControlFlow<()>, SyncError> {
        let response = self.call(SYNC_STATUS_METHOD, Vec::new()).await?;

        match SyncStatusResult::from(response) {
            SyncStatusResult::MethodUnsupported => {
                info!(session = session_id, "Node does not implement {}, treating it as synced", SYNC_STATUS_METHOD);
                Ok(ControlFlow::Break(()))
            }
            SyncStatusResult::RpcError(message) => Err(SyncError::UnexpectedRpcPayload(message)),
            SyncStatusResult::Syncing(status) => {
                self.report(session_id, SyncProgress::Syncing(status)).await;
                Ok(ControlFlow::Continue(()))
            }
            SyncStatusResult::NoStatus => self.check_head_block(session_id).await,
        }
    }

    async fn check_head_block(&self, session_id: u64) -> Result<ControlFlow<()>, SyncError> {
        if !self.is_current(session_id).await {
            return Ok(ControlFlow::Continue(()));
        }

        let response = self
            .call(LATEST_BLOCK_METHOD, vec![json!("latest"), json!(false)])
            .await?;

        let Some(head) = HeadBlock::from_response(response)? else {
            debug!(session = session_id, "Node has no head block yet");
            return Ok(ControlFlow::Continue(()));
        };

        match BlockFreshness::assess(head, Utc::now(), self.config.stale_block_threshold) {
            BlockFreshness::Fresh(head) => {
                info!(session = session_id, block = ?head.number, "Head block is recent, node is in sync");
                Ok(ControlFlow::Break(()))
            }
            BlockFreshness::Stale { head, age } => {
                self.report(session_id, SyncProgress::stale_head(&head, age)).await;
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<RpcResponse, SyncError> {
        self.transport.send(method, params).await.map_err(|e| {
            error!(method, error = %e, "Node request failed");
            SyncError::request(method, e)
        })
    }

    /// Publish progress unless the session has been closed meanwhile.
    async fn report(&self, session_id: u64, progress: SyncProgress) {
        let active = self.active.lock().await;
        if !Self::holds(&active, session_id) {
            debug!(session = session_id, "Dropping progress of a closed session");
            return;
        }

        debug!(session = session_id, %progress, "Sync progress");
        self.events.emit(SyncEvent::Progress { session_id, progress });
    }

    /// Close the session with `resolution` and publish the matching event.
    ///
    /// Only the first resolution of a session takes effect.
    async fn resolve(&self, session_id: u64, resolution: Resolution) -> bool {
        let mut active = self.active.lock().await;
        self.resolve_locked(&mut active, session_id, resolution)
    }

    fn resolve_locked(&self, active: &mut Option<ActiveSession>, session_id: u64, resolution: Resolution) -> bool {
        let current = match active.take() {
            Some(current) if current.session.id() == session_id => current,
            other => {
                *active = other;
                debug!(session = session_id, "Sync session already closed");
                return false;
            }
        };

        let event = match &resolution {
            Resolution::Errored(error) => SyncEvent::Error {
                session_id,
                error: error.clone(),
            },
            Resolution::Skipped => SyncEvent::Finished {
                session_id,
                skipped: true,
            },
            _ => SyncEvent::Finished {
                session_id,
                skipped: false,
            },
        };

        current.close(resolution);
        info!(session = session_id, event = event.name(), "Sync session resolved");
        self.events.emit(event);
        true
    }

    async fn is_current(&self, session_id: u64) -> bool {
        Self::holds(&*self.active.lock().await, session_id)
    }

    fn holds(active: &Option<ActiveSession>, session_id: u64) -> bool {
        active
            .as_ref()
            .is_some_and(|current| current.session.id() == session_id)
    }
}

impl Drop for SyncMonitor {
    fn drop(&mut self) {
        self.lifecycle_task.abort();

        if let Some(current) = self.active.get_mut().take() {
            debug!(session = current.session.id(), "Sync monitor dropped with a running session");
            current.close(Resolution::Errored(SyncError::Aborted("sync monitor dropped".to_string())));
        }
    }
}
