use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error code for a method the node does not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code == METHOD_NOT_FOUND
    }
}

impl fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.message)
        }
    }
}

/// A JSON-RPC response envelope as delivered by the transport.
///
/// A `null` result deserializes to `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(result: Value) -> Self {
        Self {
            result: (!result.is_null()).then_some(result),
            error: None,
        }
    }

    pub fn failure(error: RpcErrorObject) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }
}

/// Request channel to the node.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Whether the node answered the most recent request.
    fn is_connected(&self) -> bool;

    /// Issue one JSON-RPC call.
    ///
    /// A JSON-RPC error response is a successful transport round trip and comes
    /// back as `Ok` with `error` set; `Err` means the node could not be reached.
    async fn send(&self, method: &str, params: Vec<Value>) -> Result<RpcResponse, TransportError>;
}
