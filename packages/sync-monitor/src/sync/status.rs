use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ethers::types::{H256, U64};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::node::{RpcErrorObject, RpcResponse};
use crate::sync::SyncError;
use crate::utils::time::format_duration;

/// Progress object reported by `eth_syncing` while the node is catching up.
///
/// Nodes disagree on the exact shape, so the well-known fields are decoded when
/// present and everything else is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncingStatus {
    #[serde(default)]
    pub starting_block: Option<U64>,
    #[serde(default)]
    pub current_block: Option<U64>,
    #[serde(default)]
    pub highest_block: Option<U64>,
    #[serde(default)]
    pub known_states: Option<U64>,
    #[serde(default)]
    pub pulled_states: Option<U64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SyncingStatus {
    fn from_fields(fields: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(fields.clone())).unwrap_or_else(|_| Self {
            extra: fields,
            ..Self::default()
        })
    }

    pub fn remaining_blocks(&self) -> Option<u64> {
        let current = self.current_block?.as_u64();
        let highest = self.highest_block?.as_u64();
        Some(highest.saturating_sub(current))
    }

    /// Share of the range from `startingBlock` to `highestBlock` already processed.
    pub fn progress_percent(&self) -> Option<f64> {
        let start = self.starting_block.map(|b| b.as_u64()).unwrap_or(0);
        let current = self.current_block?.as_u64();
        let highest = self.highest_block?.as_u64();

        let total = highest.saturating_sub(start);
        if total == 0 {
            return Some(100.0);
        }
        let done = current.saturating_sub(start).min(total);
        Some(done as f64 / total as f64 * 100.0)
    }
}

/// Classification of one `eth_syncing` reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatusResult {
    /// The node is catching up.
    Syncing(SyncingStatus),
    /// The node does not implement `eth_syncing`.
    MethodUnsupported,
    /// Any other error payload.
    RpcError(String),
    /// No sync object; the head block has to be inspected.
    NoStatus,
}

impl SyncStatusResult {
    fn from_error(error: RpcErrorObject) -> Self {
        if error.is_method_not_found() {
            Self::MethodUnsupported
        } else {
            Self::RpcError(error.to_string())
        }
    }
}

impl From<RpcResponse> for SyncStatusResult {
    fn from(response: RpcResponse) -> Self {
        if let Some(error) = response.error {
            return Self::from_error(error);
        }

        match response.result {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Self::NoStatus,
            Some(Value::Bool(true)) => Self::Syncing(SyncingStatus::default()),
            Some(Value::Object(mut fields)) => match fields.remove("error") {
                // Some IPC bridges wrap the error inside the result
                Some(nested) => match serde_json::from_value::<RpcErrorObject>(nested.clone()) {
                    Ok(error) => Self::from_error(error),
                    Err(_) => Self::RpcError(nested.to_string()),
                },
                None => Self::Syncing(SyncingStatus::from_fields(fields)),
            },
            Some(other) => Self::RpcError(format!("unrecognised sync status {}", other)),
        }
    }
}

/// Latest block as returned by `eth_getBlockByNumber("latest", false)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeadBlock {
    #[serde(default)]
    pub number: Option<U64>,
    #[serde(default)]
    pub hash: Option<H256>,
    pub timestamp: U64,
}

impl HeadBlock {
    /// Decode the head block, `None` when the node has no block yet.
    pub fn from_response(response: RpcResponse) -> Result<Option<Self>, SyncError> {
        if let Some(error) = response.error {
            return Err(SyncError::RpcFailure(format!("eth_getBlockByNumber returned {}", error)));
        }

        match response.result {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SyncError::UnexpectedRpcPayload(format!("undecodable head block: {}", e))),
        }
    }

    /// Wall-clock age at `now`; zero for timestamps in the future.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        let now = u64::try_from(now.timestamp()).unwrap_or(0);
        Duration::from_secs(now.saturating_sub(self.timestamp.as_u64()))
    }
}

/// Verdict on the head block when the node reports no sync status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockFreshness {
    Fresh(HeadBlock),
    Stale { head: HeadBlock, age: Duration },
}

impl BlockFreshness {
    /// A head older than `threshold` means the node is still catching up.
    pub fn assess(head: HeadBlock, now: DateTime<Utc>, threshold: Duration) -> Self {
        let age = head.age_at(now);
        if age > threshold {
            Self::Stale { head, age }
        } else {
            Self::Fresh(head)
        }
    }
}

/// Payload of a progress event.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncProgress {
    /// Reported by `eth_syncing`.
    Syncing(SyncingStatus),
    /// Derived from a head block older than the staleness threshold.
    StaleHead {
        block_number: Option<u64>,
        timestamp: u64,
        age: Duration,
    },
}

impl SyncProgress {
    pub(crate) fn stale_head(head: &HeadBlock, age: Duration) -> Self {
        Self::StaleHead {
            block_number: head.number.map(|n| n.as_u64()),
            timestamp: head.timestamp.as_u64(),
            age,
        }
    }
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syncing(status) => match (status.current_block, status.highest_block) {
                (Some(current), Some(highest)) => {
                    write!(f, "block {}/{}", current.as_u64(), highest.as_u64())?;
                    if let Some(percent) = status.progress_percent() {
                        write!(f, " ({:.1}%)", percent)?;
                    }
                    Ok(())
                }
                _ => f.write_str("syncing"),
            },
            Self::StaleHead { block_number, age, .. } => {
                match block_number {
                    Some(number) => write!(f, "head block {}", number)?,
                    None => f.write_str("head block")?,
                }
                write!(f, " is {} old", format_duration(*age))
            }
        }
    }
}
