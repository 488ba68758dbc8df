use crate::sync::{SyncError, SyncProgress};

/// Events published by the sync monitor, tagged with the session they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Starting { session_id: u64 },
    Progress { session_id: u64, progress: SyncProgress },
    /// The session ended successfully; `skipped` when a skip request ended it.
    Finished { session_id: u64, skipped: bool },
    Error { session_id: u64, error: SyncError },
    Stopped { session_id: u64 },
}

impl SyncEvent {
    pub fn session_id(&self) -> u64 {
        match self {
            Self::Starting { session_id }
            | Self::Progress { session_id, .. }
            | Self::Finished { session_id, .. }
            | Self::Error { session_id, .. }
            | Self::Stopped { session_id } => *session_id,
        }
    }

    /// Short event name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Starting { .. } => "starting",
            Self::Progress { .. } => "progress",
            Self::Finished { .. } => "finished",
            Self::Error { .. } => "error",
            Self::Stopped { .. } => "stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let events = [
            SyncEvent::Starting { session_id: 1 },
            SyncEvent::Finished { session_id: 1, skipped: true },
            SyncEvent::Error {
                session_id: 1,
                error: SyncError::NotConnected,
            },
            SyncEvent::Stopped { session_id: 1 },
        ];

        let names: Vec<_> = events.iter().map(SyncEvent::name).collect();
        assert_eq!(names, ["starting", "finished", "error", "stopped"]);
        assert!(events.iter().all(|e| e.session_id() == 1));
    }
}
