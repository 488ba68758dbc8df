use std::fmt;

use tracing::info;

use crate::event_bus::{EventBus, EventReceiver};

/// Externally observed state of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Starting,
    Connected,
    Stopping,
    Stopped,
    Error,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Connected => "connected",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Publisher of node state transitions.
#[derive(Debug, Clone)]
pub struct NodeLifecycle {
    bus: EventBus<NodeState>,
}

impl NodeLifecycle {
    pub fn new(capacity: usize) -> Self {
        Self {
            bus: EventBus::new(capacity),
        }
    }

    pub fn subscribe(&self) -> EventReceiver<NodeState> {
        self.bus.subscribe()
    }

    /// Announce a transition. Never waits on subscribers.
    pub fn transition(&self, state: NodeState) {
        info!(%state, "Node state changed");
        self.bus.emit(state);
    }
}

impl Default for NodeLifecycle {
    fn default() -> Self {
        Self::new(16)
    }
}
