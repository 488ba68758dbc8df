//! Broadcast fan-out used for sync events, node lifecycle transitions and the
//! skip signal.
//!
//! Publishing never waits on receivers. A receiver that falls more than the
//! bus capacity behind loses the oldest events and is told how many it missed.

use thiserror::Error;
use tokio::sync::broadcast;

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Event receive errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Receiver lagged behind by {0} events")]
    Lagged(u64),

    #[error("Event bus closed")]
    Closed,
}

/// Broadcast bus; every subscriber receives every event published after it subscribed.
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus buffering up to `capacity` events per slow receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver<T> {
        EventReceiver::new(self.sender.subscribe())
    }

    /// Publish an event, returning how many receivers it reached.
    ///
    /// Having no receivers is not an error.
    pub fn emit(&self, event: T) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[derive(Debug)]
pub struct EventReceiver<T: Clone> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> EventReceiver<T> {
    pub fn new(receiver: broadcast::Receiver<T>) -> Self {
        Self { receiver }
    }

    pub async fn recv(&mut self) -> Result<T, EventError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(n) => EventError::Lagged(n),
            broadcast::error::RecvError::Closed => EventError::Closed,
        })
    }

    /// Take the next buffered event without waiting, if there is one.
    pub fn try_recv(&mut self) -> Option<Result<T, EventError>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Lagged(n)) => Some(Err(EventError::Lagged(n))),
            Err(broadcast::error::TryRecvError::Closed) => Some(Err(EventError::Closed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        assert_eq!(bus.emit("Test event"), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, "Test event");
    }

    #[test]
    fn test_event_bus_no_receivers() {
        let bus = EventBus::new(16);
        // Emitting without subscribers should not panic
        assert_eq!(bus.emit("Test event"), 0);
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        bus.emit("Test event");

        assert_eq!(rx1.recv().await.unwrap(), "Test event");
        assert_eq!(rx2.recv().await.unwrap(), "Test event");

        drop(rx2);
        assert_eq!(bus.receiver_count(), 1);
    }

    #[test]
    fn test_slow_receiver_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.emit(i);
        }

        assert_eq!(rx.try_recv(), Some(Err(EventError::Lagged(3))));
        assert_eq!(rx.try_recv(), Some(Ok(3)));
        assert_eq!(rx.try_recv(), Some(Ok(4)));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = EventBus::<u8>::new(4);
        let mut rx = bus.subscribe();
        drop(bus);
        assert_eq!(rx.recv().await, Err(EventError::Closed));
    }
}
