// Event Bus Implementation - Pub/Sub for Navigation Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Enables real-time observation of navigation lifecycle by shells,
// devtools, and tests.
//
// In-memory only: events are lost when no subscriber is attached, which is
// the browser-history semantic this engine mirrors.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::NavigationEvent;

/// Event bus for publishing and subscribing to navigation events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<NavigationEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events can be buffered before dropping
    /// old ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (256)
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish a navigation event to all subscribers
    pub fn publish(&self, event: NavigationEvent) {
        debug!("Publishing event: {:?}", event);

        // send() returns the number of receivers that received the message
        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all navigation events
    pub fn subscribe(&self) -> EventReceiver {
        let receiver = self.sender.subscribe();
        EventReceiver { receiver }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for navigation events
pub struct EventReceiver {
    receiver: broadcast::Receiver<NavigationEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocks until event is available)
    pub async fn recv(&mut self) -> Result<NavigationEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<NavigationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => EventBusError::Lagged(n),
        })
    }
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event bus channel closed")]
    Closed,
    #[error("no event available")]
    Empty,
    #[error("receiver lagged by {0} events")]
    Lagged(u64),
}
