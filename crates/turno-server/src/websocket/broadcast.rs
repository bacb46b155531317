//! Topic-based event fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use turno_rpc::types::RpcEvent;

use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

use super::connection::ClientConnection;

/// A client that has dropped this many events is force-disconnected; a
/// consumer that far behind is not coming back.
pub const DROP_BUDGET: u64 = 64;

/// Manages event broadcasting to connected clients.
///
/// Delivery is fire-and-forget: every event is serialized once, the shared
/// payload is pushed to each subscriber's send queue, and a full queue means
/// the event is dropped for that client.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Publish an event to every connection subscribed to its topic.
    pub async fn publish(&self, event: &RpcEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = event.event_type, error = %e, "failed to serialize event");
                return;
            }
        };

        let conns = self.connections.read().await;
        let mut recipients = 0usize;
        for conn in conns.values() {
            if !conn.is_subscribed(&event.topic) {
                continue;
            }
            recipients += 1;
            if conn.send(json.clone()) {
                continue;
            }
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
            if conn.drop_count() >= DROP_BUDGET && !conn.is_disconnecting() {
                warn!(
                    conn_id = %conn.id,
                    drops = conn.drop_count(),
                    "slow consumer exceeded drop budget, disconnecting"
                );
                conn.disconnect();
            }
        }
        debug!(
            event_type = event.event_type,
            topic = event.topic,
            recipients,
            "published event"
        );
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Connections subscribed to the given topic.
    pub async fn topic_subscribers(&self, topic: &str) -> Vec<Arc<ClientConnection>> {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|c| c.is_subscribed(topic))
            .cloned()
            .collect()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
