use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Provider, RpcError, Ws};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::transport::{NodeTransport, RpcErrorObject, RpcResponse, TransportError};

/// `NodeTransport` backed by an ethers provider.
///
/// The node counts as connected once it has answered a request, including with
/// a JSON-RPC error, and as disconnected after a request fails to reach it.
#[derive(Debug)]
pub struct EthersTransport<P> {
    provider: Provider<P>,
    connected: AtomicBool,
}

impl<P: JsonRpcClient> EthersTransport<P> {
    pub fn new(provider: Provider<P>) -> Self {
        Self {
            provider,
            connected: AtomicBool::new(false),
        }
    }

    fn mark_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        if was != connected {
            debug!(connected, "Node transport connectivity changed");
        }
    }
}

impl EthersTransport<Http> {
    /// Create an HTTP transport. No request is made until the first call.
    pub fn http(url: &str) -> Result<Self, TransportError> {
        info!("Creating HTTP provider for {}", url);
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", url, e)))?;
        Ok(Self::new(provider))
    }
}

impl EthersTransport<Ws> {
    /// Connect a WebSocket transport.
    pub async fn ws(url: &str) -> Result<Self, TransportError> {
        info!("Creating WebSocket provider from URL: {}", url);
        let ws = Ws::connect(url)
            .await
            .map_err(|e| TransportError::Request(format!("Failed to connect to WebSocket: {}", e)))?;

        let transport = Self::new(Provider::new(ws));
        transport.mark_connected(true);
        info!("Successfully connected to WebSocket provider");
        Ok(transport)
    }
}

#[async_trait]
impl<P> NodeTransport for EthersTransport<P>
where
    P: JsonRpcClient + 'static,
{
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn send(&self, method: &str, params: Vec<Value>) -> Result<RpcResponse, TransportError> {
        debug!(method, "Sending node request");

        match self.provider.request::<_, Value>(method, params).await {
            Ok(result) => {
                self.mark_connected(true);
                Ok(RpcResponse::success(result))
            }
            Err(err) => match err.as_error_response() {
                Some(rpc_error) => {
                    self.mark_connected(true);
                    Ok(RpcResponse::failure(RpcErrorObject {
                        code: rpc_error.code,
                        message: rpc_error.message.clone(),
                        data: rpc_error.data.clone(),
                    }))
                }
                None => {
                    warn!(method, error = %err, "Node request failed");
                    self.mark_connected(false);
                    Err(TransportError::Request(err.to_string()))
                }
            },
        }
    }
}
