//! Shared helpers for driving the sync monitor against a scripted node.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sync_monitor::event_bus::EventReceiver;
use sync_monitor::node::{NodeLifecycle, NodeTransport, RpcErrorObject, RpcResponse, TransportError};
use sync_monitor::sync::{MonitorConfig, SkipSignal, SyncEvent, SyncMonitor};

/// What the scripted node does with one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(RpcResponse),
    Fail(TransportError),
    Delayed(Duration, Box<Reply>),
    /// The transport itself panics with this message.
    Panic(&'static str),
}

impl Reply {
    pub fn after(self, delay: Duration) -> Self {
        Reply::Delayed(delay, Box::new(self))
    }
}

/// In-memory node with per-method reply queues and a call log.
///
/// When a method's queue is empty the method's fallback reply is used, and
/// without a fallback the node answers `null`.
pub struct MockTransport {
    connected: AtomicBool,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallbacks: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn connected() -> Arc<Self> {
        Arc::new(Self::with_connectivity(true))
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::with_connectivity(false))
    }

    fn with_connectivity(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            scripts: Mutex::new(HashMap::new()),
            fallbacks: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue a reply for the next unanswered call of `method`.
    pub fn push(&self, method: &str, reply: Reply) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn fallback(&self, method: &str, reply: Reply) -> &Self {
        self.fallbacks.lock().unwrap().insert(method.to_string(), reply);
        self
    }

    /// Methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, method: &str) -> Reply {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front);

        scripted
            .or_else(|| self.fallbacks.lock().unwrap().get(method).cloned())
            .unwrap_or_else(|| Reply::Respond(RpcResponse::default()))
    }
}

#[async_trait]
impl NodeTransport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, method: &str, _params: Vec<Value>) -> Result<RpcResponse, TransportError> {
        self.calls.lock().unwrap().push(method.to_string());

        let mut reply = self.next_reply(method);
        loop {
            match reply {
                Reply::Respond(response) => return Ok(response),
                Reply::Fail(error) => return Err(error),
                Reply::Panic(message) => panic!("{}", message),
                Reply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

pub fn result(value: Value) -> Reply {
    Reply::Respond(RpcResponse::success(value))
}

pub fn syncing(current: u64, highest: u64) -> Reply {
    result(json!({
        "startingBlock": "0x0",
        "currentBlock": format!("{:#x}", current),
        "highestBlock": format!("{:#x}", highest),
    }))
}

pub fn not_syncing() -> Reply {
    result(json!(false))
}

/// `{result: {error: {code: -32601}}}` as some IPC bridges report it.
pub fn method_not_found() -> Reply {
    result(json!({"error": {"code": -32601}}))
}

pub fn rpc_error(code: i64, message: &str) -> Reply {
    Reply::Respond(RpcResponse::failure(RpcErrorObject::new(code, message)))
}

pub fn transport_failure(message: &str) -> Reply {
    Reply::Fail(TransportError::Request(message.to_string()))
}

/// Latest block whose timestamp is `age` before the wall clock.
pub fn head_block_aged(number: u64, age: Duration) -> Reply {
    let timestamp = Utc::now().timestamp() as u64 - age.as_secs();
    result(json!({
        "number": format!("{:#x}", number),
        "hash": "0x88e96d4537bea4d9c05d12549907b32561d3bf31f45aae734cdc119f13406cb6",
        "timestamp": format!("{:#x}", timestamp),
    }))
}

pub fn no_block() -> Reply {
    Reply::Respond(RpcResponse::default())
}

/// Monitor wired to a mock transport with default timing.
pub struct Harness {
    pub monitor: Arc<SyncMonitor>,
    pub lifecycle: NodeLifecycle,
    pub skip: SkipSignal,
}

impl Harness {
    pub fn new(transport: Arc<MockTransport>) -> Self {
        let lifecycle = NodeLifecycle::default();
        let skip = SkipSignal::new();
        let monitor = SyncMonitor::new(transport, &lifecycle, skip.clone(), MonitorConfig::default());
        Self {
            monitor,
            lifecycle,
            skip,
        }
    }
}

pub async fn next_event(events: &mut EventReceiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("timed out waiting for a sync event")
        .expect("sync event bus failed")
}
