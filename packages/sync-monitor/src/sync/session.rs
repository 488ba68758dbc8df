use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::sync::SyncError;

/// How a sync session ended, or `Pending` while it is still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Pending,
    Done,
    Skipped,
    Stopped,
    Errored(SyncError),
}

impl Resolution {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn outcome(&self) -> Option<Result<SyncOutcome, SyncError>> {
        match self {
            Self::Pending => None,
            Self::Done => Some(Ok(SyncOutcome::Finished)),
            Self::Skipped => Some(Ok(SyncOutcome::Skipped)),
            Self::Stopped => Some(Ok(SyncOutcome::Stopped)),
            Self::Errored(e) => Some(Err(e.clone())),
        }
    }
}

/// Successful end of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The node is in sync.
    Finished,
    /// A skip request ended the session.
    Skipped,
    /// `stop()` ended the session before it resolved.
    Stopped,
}

/// Handle to one sync session. Clones observe the same session.
#[derive(Debug, Clone)]
pub struct SyncSession {
    id: u64,
    started_at: DateTime<Utc>,
    resolution: watch::Receiver<Resolution>,
}

impl SyncSession {
    /// Create a pending session and the sender that resolves it.
    pub(crate) fn open(id: u64) -> (Self, SessionResolver) {
        let (sender, resolution) = watch::channel(Resolution::Pending);
        let session = Self {
            id,
            started_at: Utc::now(),
            resolution,
        };
        (session, SessionResolver { sender })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.resolution.borrow().is_pending()
    }

    /// Wait for the session to end.
    pub async fn wait(&self) -> Result<SyncOutcome, SyncError> {
        let mut resolution = self.resolution.clone();
        // An error only means the resolver is gone; its last write is final.
        let _ = resolution.wait_for(|r| !r.is_pending()).await;

        let outcome = resolution.borrow().outcome();
        outcome.unwrap_or_else(|| Err(SyncError::Aborted("session dropped without resolution".to_string())))
    }
}

/// Write side of a session's resolution. Consumed on use, so it resolves once.
#[derive(Debug)]
pub(crate) struct SessionResolver {
    sender: watch::Sender<Resolution>,
}

impl SessionResolver {
    pub(crate) fn resolve(self, resolution: Resolution) {
        self.sender.send_replace(resolution);
    }
}
