use thiserror::Error;

use crate::node::TransportError;

/// Errors that end a sync session or prevent one from starting.
///
/// Cloneable so the same error can be stored in the session resolution and
/// fanned out to every event listener.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Node is not connected")]
    NotConnected,

    #[error("RPC failure: {0}")]
    RpcFailure(String),

    #[error("Unexpected RPC payload: {0}")]
    UnexpectedRpcPayload(String),

    #[error("Sync session aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    /// Whether the error came from talking to the node.
    pub fn is_rpc_failure(&self) -> bool {
        matches!(self, Self::RpcFailure(_) | Self::UnexpectedRpcPayload(_))
    }

    pub(crate) fn request(method: &str, error: TransportError) -> Self {
        Self::RpcFailure(format!("{} failed: {}", method, error))
    }
}
