//! Follows a blockchain node while it catches up with the network and reports
//! a single outcome: in sync, skipped, or failed.
//!
//! [`sync::SyncMonitor`] is the entry point. It polls the node through a
//! [`node::NodeTransport`], reacts to [`node::NodeLifecycle`] transitions and
//! publishes [`sync::SyncEvent`]s to any number of subscribers.

pub mod config;
pub mod event_bus;
pub mod node;
pub mod sync;
pub mod utils;

pub use sync::{MonitorConfig, SkipSignal, SyncError, SyncEvent, SyncMonitor, SyncOutcome, SyncSession};
