use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::sync::MonitorConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub node_rpc_url: String,
    pub poll_interval_ms: u64,
    pub stale_block_threshold_secs: u64,
    pub node_check_interval_ms: u64,
    pub event_capacity: usize,
    pub log_level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenv::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let node_rpc_url = lookup("NODE_RPC_URL")
            .context("NODE_RPC_URL must be set")?;

        let poll_interval_ms = parse_or::<_, u64>(&lookup, "SYNC_POLL_INTERVAL_MS", 2000)
            .context("SYNC_POLL_INTERVAL_MS must be a valid number")?;
        ensure!(poll_interval_ms > 0, "SYNC_POLL_INTERVAL_MS must be greater than 0");

        let stale_block_threshold_secs = parse_or::<_, u64>(&lookup, "STALE_BLOCK_THRESHOLD_SECS", 60)
            .context("STALE_BLOCK_THRESHOLD_SECS must be a valid number")?;

        let node_check_interval_ms = parse_or::<_, u64>(&lookup, "NODE_CHECK_INTERVAL_MS", 5000)
            .context("NODE_CHECK_INTERVAL_MS must be a valid number")?;
        ensure!(node_check_interval_ms > 0, "NODE_CHECK_INTERVAL_MS must be greater than 0");

        let event_capacity = parse_or::<_, usize>(&lookup, "SYNC_EVENT_CAPACITY", 64)
            .context("SYNC_EVENT_CAPACITY must be a valid number")?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Config {
            node_rpc_url,
            poll_interval_ms,
            stale_block_threshold_secs,
            node_check_interval_ms,
            event_capacity,
            log_level,
        })
    }

    pub fn node_check_interval(&self) -> Duration {
        Duration::from_millis(self.node_check_interval_ms)
    }

    /// Whether the node endpoint is a WebSocket URL.
    pub fn uses_websocket(&self) -> bool {
        self.node_rpc_url.starts_with("ws://") || self.node_rpc_url.starts_with("wss://")
    }
}

impl From<&Config> for MonitorConfig {
    fn from(config: &Config) -> Self {
        MonitorConfig::default()
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
            .with_stale_block_threshold(Duration::from_secs(config.stale_block_threshold_secs))
            .with_event_capacity(config.event_capacity)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, T::Err>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse(),
        None => Ok(default),
    }
}
