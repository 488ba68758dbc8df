//! Collaborators the sync monitor talks to: the RPC transport, the node
//! lifecycle feed and the connectivity watcher that drives it.

mod lifecycle;
mod provider;
mod transport;
mod watcher;

pub use lifecycle::{NodeLifecycle, NodeState};
pub use provider::EthersTransport;
pub use transport::{NodeTransport, RpcErrorObject, RpcResponse, TransportError, METHOD_NOT_FOUND};
pub use watcher::ConnectionWatcher;
