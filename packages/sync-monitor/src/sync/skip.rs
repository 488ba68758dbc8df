use tracing::{debug, info};

use crate::event_bus::{EventBus, EventReceiver};

/// External override that ends the running sync session successfully.
///
/// The monitor subscribes once per session and drops the subscription when the
/// session ends, so `listener_count` is 0 or 1 for a single monitor.
#[derive(Debug, Clone)]
pub struct SkipSignal {
    bus: EventBus<()>,
}

impl SkipSignal {
    pub fn new() -> Self {
        Self { bus: EventBus::new(1) }
    }

    /// Request a skip. Returns whether a session was listening.
    pub fn trigger(&self) -> bool {
        let delivered = self.bus.emit(()) > 0;
        if delivered {
            info!("Sync skip requested");
        } else {
            debug!("Sync skip requested with no session listening");
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.bus.receiver_count()
    }

    pub(crate) fn subscribe(&self) -> EventReceiver<()> {
        self.bus.subscribe()
    }
}

impl Default for SkipSignal {
    fn default() -> Self {
        Self::new()
    }
}
