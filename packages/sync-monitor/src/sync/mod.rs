mod error;
mod events;
mod monitor;
mod session;
mod skip;
mod status;

pub use error::SyncError;
pub use events::SyncEvent;
pub use monitor::{MonitorConfig, SyncMonitor};
pub use session::{Resolution, SyncOutcome, SyncSession};
pub use skip::SkipSignal;
pub use status::{BlockFreshness, HeadBlock, SyncProgress, SyncStatusResult, SyncingStatus};
