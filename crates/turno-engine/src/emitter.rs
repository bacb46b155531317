//! Broadcast fan-out for engine events.
//!
//! A thin wrapper over [`tokio::sync::broadcast`]. Delivery is
//! fire-and-forget: sends to a channel with no subscribers (or with lagging
//! ones) never fail a transition, they just log at trace level.

use tokio::sync::broadcast;
use tracing::trace;

use turno_core::events::QueueEvent;

/// Default channel capacity before slow subscribers start lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast emitter for [`QueueEvent`]s.
pub struct EventEmitter {
    tx: broadcast::Sender<QueueEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    /// Create an emitter with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an emitter with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers. Never fails.
    pub fn emit(&self, event: QueueEvent) {
        match self.tx.send(event) {
            Ok(receivers) => {
                trace!(receivers, "event broadcast");
            }
            Err(broadcast::error::SendError(event)) => {
                trace!(event = event.name(), "no subscribers, event dropped");
            }
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
