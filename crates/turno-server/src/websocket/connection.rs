//! WebSocket client connection state.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Represents a connected WebSocket client.
///
/// Topic membership lives here: the session task mutates the set as the
/// client issues `events.subscribe` / `events.unsubscribe` (or joins a
/// queue, which auto-subscribes its session topic), and the broadcast
/// manager consults it when fanning events out.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Topics this client receives events for (`office:{id}`, `session:{id}`).
    topics: Mutex<HashSet<String>>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded since the last ping.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of events dropped due to a full channel.
    dropped_messages: AtomicU64,
    /// Cancelled to force-disconnect a slow or dead client.
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection.
    #[must_use]
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            topics: Mutex::new(HashSet::new()),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Add a topic to this connection's subscriptions.
    pub fn subscribe(&self, topic: String) {
        let _ = self.topics.lock().insert(topic);
    }

    /// Remove a topic from this connection's subscriptions.
    pub fn unsubscribe(&self, topic: &str) {
        let _ = self.topics.lock().remove(topic);
    }

    /// Whether this connection is subscribed to the given topic.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics.lock().contains(topic)
    }

    /// Snapshot of the current subscription set.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().iter().cloned().collect()
    }

    /// Send a serialized message to the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this connection.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Force-disconnect this client; the session task observes the token.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Whether a forced disconnect was requested.
    #[must_use]
    pub fn is_disconnecting(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token the session task selects on to observe forced disconnects.
    #[must_use]
    pub fn disconnect_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mark the connection as alive (pong or inbound frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    #[must_use]
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the heartbeat cycle.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
