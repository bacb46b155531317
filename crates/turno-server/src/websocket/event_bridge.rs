//! Event bridge — converts engine [`QueueEvent`]s into wire events and
//! routes them through the [`BroadcastManager`].
//!
//! Session lifecycle changes go out immediately on the `session:{id}` topic
//! and are mirrored to `office:{id}`. Queue snapshots are throttled: a
//! `queue_changed` engine event only marks the office dirty, and a flush
//! tick publishes at most one `queue-updated` per office per throttle
//! window, always trailing the last change. Stats snapshots go out on their
//! own slower cadence, and only for offices that changed since the previous
//! emission.
//!
//! An office whose config sets `notificationsEnabled: false` keeps its
//! `office:{id}` topic silent; `session:{id}` topics are unaffected.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use turno_core::events::QueueEvent;
use turno_core::ids::OfficeId;
use turno_engine::service::{QueueService, QueueSort};
use turno_rpc::types::RpcEvent;

use super::broadcast::BroadcastManager;

/// Timing knobs for the bridge, sourced from engine settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Minimum spacing between `queue-updated` emissions per office.
    pub queue_update_throttle: Duration,
    /// Spacing between `stats-updated` emissions.
    pub stats_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_update_throttle: Duration::from_millis(1000),
            stats_interval: Duration::from_secs(5),
        }
    }
}

/// Bridges engine events to WebSocket subscribers.
pub struct EventBridge {
    rx: broadcast::Receiver<QueueEvent>,
    broadcast: Arc<BroadcastManager>,
    service: Arc<QueueService>,
    config: BridgeConfig,
}

impl EventBridge {
    /// Create a new event bridge.
    #[must_use]
    pub fn new(
        rx: broadcast::Receiver<QueueEvent>,
        broadcast: Arc<BroadcastManager>,
        service: Arc<QueueService>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            rx,
            broadcast,
            service,
            config,
        }
    }

    /// Run the bridge loop until the engine channel closes or `cancel`
    /// fires.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut queue_dirty: HashSet<OfficeId> = HashSet::new();
        let mut stats_dirty: HashSet<OfficeId> = HashSet::new();

        let mut flush_tick = tokio::time::interval(self.config.queue_update_throttle);
        let mut stats_tick = tokio::time::interval(self.config.stats_interval);
        // The first tick of an interval fires immediately; with nothing
        // dirty yet it is a no-op.

        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    match event {
                        Ok(event) => {
                            let office = event.office_id().clone();
                            if matches!(event, QueueEvent::QueueChanged { .. }) {
                                let _ = queue_dirty.insert(office.clone());
                            }
                            let _ = stats_dirty.insert(office);
                            self.forward_session_delta(&event).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(lagged = n, "event bridge lagged behind the engine");
                            // Snapshots self-heal: treat everything pending
                            // as dirty and move on.
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("engine event channel closed, bridge exiting");
                            break;
                        }
                    }
                }
                _ = flush_tick.tick() => {
                    for office in queue_dirty.drain() {
                        self.publish_queue_snapshot(&office).await;
                    }
                }
                _ = stats_tick.tick() => {
                    for office in stats_dirty.drain() {
                        self.publish_stats(&office).await;
                    }
                }
                () = cancel.cancelled() => {
                    info!("event bridge cancelled");
                    break;
                }
            }
        }
    }

    /// Push a session lifecycle delta to its session topic, mirrored to the
    /// office topic. Joined/queue-changed carry no delta; subscribers get
    /// those through the throttled snapshot.
    async fn forward_session_delta(&self, event: &QueueEvent) {
        let Some(wire_type) = wire_event_type(event) else {
            return;
        };
        let Some(session) = event.session() else {
            return;
        };
        let data = session_delta_data(event);
        debug!(wire_type, session_id = session.id.as_str(), "forwarding session delta");

        let session_topic = format!("session:{}", session.id.as_str());
        self.broadcast
            .publish(&RpcEvent::new(wire_type, session_topic, Some(data.clone())))
            .await;
        if self.office_broadcasts_enabled(event.office_id()) {
            let office_topic = format!("office:{}", event.office_id().as_str());
            self.broadcast
                .publish(&RpcEvent::new(wire_type, office_topic, Some(data)))
                .await;
        }
    }

    /// Whether the office has opted into office-topic broadcasts. Session
    /// topics are exempt: a client always hears about its own session.
    fn office_broadcasts_enabled(&self, office: &OfficeId) -> bool {
        match self.service.get_config(office) {
            Ok(config) => config.notifications_enabled,
            Err(e) => {
                warn!(office = office.as_str(), error = %e, "failed to load office config");
                true
            }
        }
    }

    /// Publish one `queue-updated` snapshot for a dirty office.
    async fn publish_queue_snapshot(&self, office: &OfficeId) {
        if !self.office_broadcasts_enabled(office) {
            return;
        }
        let queue = match self.service.get_queue(office, None, QueueSort::Queue).await {
            Ok(q) => q,
            Err(e) => {
                warn!(office = office.as_str(), error = %e, "failed to load queue snapshot");
                return;
            }
        };
        let stats = match self.service.get_stats(office).await {
            Ok(s) => s,
            Err(e) => {
                warn!(office = office.as_str(), error = %e, "failed to load stats snapshot");
                return;
            }
        };
        let data = json!({
            "officeId": office,
            "queue": queue,
            "stats": stats,
        });
        let topic = format!("office:{}", office.as_str());
        self.broadcast
            .publish(&RpcEvent::new("queue-updated", topic, Some(data)))
            .await;
    }

    /// Publish one `stats-updated` for an office with changes this window.
    async fn publish_stats(&self, office: &OfficeId) {
        if !self.office_broadcasts_enabled(office) {
            return;
        }
        let stats = match self.service.get_stats(office).await {
            Ok(s) => s,
            Err(e) => {
                warn!(office = office.as_str(), error = %e, "failed to load stats snapshot");
                return;
            }
        };
        let data = serde_json::to_value(&stats).unwrap_or(Value::Null);
        let topic = format!("office:{}", office.as_str());
        self.broadcast
            .publish(&RpcEvent::new("stats-updated", topic, Some(data)))
            .await;
    }
}

/// Wire event name for a session-scoped engine event, or `None` for events
/// covered by the queue snapshot.
fn wire_event_type(event: &QueueEvent) -> Option<&'static str> {
    match event {
        QueueEvent::SessionReady { .. } => Some("session-ready"),
        QueueEvent::SessionCalled { .. } => Some("session-called"),
        QueueEvent::SessionCompleted { .. } => Some("session-completed"),
        QueueEvent::SessionExpired { .. } => Some("session-expired"),
        QueueEvent::SessionCancelled { .. } => Some("session-cancelled"),
        QueueEvent::SessionJoined { .. } | QueueEvent::QueueChanged { .. } => None,
    }
}

/// Delta payload for a session-scoped wire event.
fn session_delta_data(event: &QueueEvent) -> Value {
    let mut data = json!({
        "officeId": event.office_id(),
        "session": event.session(),
    });
    match event {
        QueueEvent::SessionExpired {
            reason,
            prior_status,
            ..
        } => {
            data["reason"] = json!(reason);
            data["priorStatus"] = json!(prior_status);
        }
        QueueEvent::SessionCancelled {
            reason: Some(reason),
            ..
        } => {
            data["reason"] = json!(reason);
        }
        _ => {}
    }
    data
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use turno_core::ids::SessionId;
    use turno_core::types::{Priority, TramiteType};
    use turno_engine::service::{JoinRequest, ServiceOptions};
    use turno_store::QueueStore;

    use crate::websocket::connection::ClientConnection;

    fn make_service() -> Arc<QueueService> {
        let pool =
            turno_store::new_in_memory(&turno_store::ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = turno_store::run_migrations(&conn).unwrap();
        }
        let store = Arc::new(QueueStore::new(pool));
        Arc::new(QueueService::new(store, ServiceOptions::default()))
    }

    async fn subscriber(
        broadcast: &BroadcastManager,
        id: &str,
        topics: &[&str],
    ) -> mpsc::Receiver<Arc<String>> {
        let (tx, rx) = mpsc::channel(256);
        let conn = Arc::new(ClientConnection::new(id.into(), tx));
        for topic in topics {
            conn.subscribe((*topic).to_string());
        }
        broadcast.add(conn).await;
        rx
    }

    fn spawn_bridge(
        service: &Arc<QueueService>,
        broadcast: &Arc<BroadcastManager>,
        config: BridgeConfig,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let bridge = EventBridge::new(
            service.subscribe(),
            broadcast.clone(),
            service.clone(),
            config,
        );
        let _ = tokio::spawn(bridge.run(cancel.clone()));
        cancel
    }

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            queue_update_throttle: Duration::from_millis(50),
            stats_interval: Duration::from_millis(100),
        }
    }

    async fn join(service: &Arc<QueueService>, office: &str, name: &str) -> SessionId {
        let session = service
            .join_queue(JoinRequest {
                office_id: OfficeId::from(office),
                client_name: name.to_string(),
                tramite_type: TramiteType::Compraventa,
                priority: Priority::Normal,
                timeout_override_minutes: None,
                metadata: None,
            })
            .await
            .unwrap();
        session.id
    }

    async fn collect_types(
        rx: &mut mpsc::Receiver<Arc<String>>,
        wait: Duration,
    ) -> Vec<(String, String)> {
        tokio::time::sleep(wait).await;
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            let value: Value = serde_json::from_str(&msg).unwrap();
            out.push((
                value["type"].as_str().unwrap_or_default().to_string(),
                value["topic"].as_str().unwrap_or_default().to_string(),
            ));
        }
        out
    }

    #[tokio::test]
    async fn session_deltas_reach_session_and_office_topics() {
        let service = make_service();
        let broadcast = Arc::new(BroadcastManager::new());
        let cancel = spawn_bridge(&service, &broadcast, fast_config());

        let sid = join(&service, "ofi_centro", "Ana").await;
        let session_topic = format!("session:{}", sid.as_str());
        let mut session_rx = subscriber(&broadcast, "c1", &[&session_topic]).await;
        let mut office_rx = subscriber(&broadcast, "c2", &["office:ofi_centro"]).await;

        let _ = service.mark_ready(&sid).await.unwrap();
        let _ = service.activate(&sid).await.unwrap();

        let session_events = collect_types(&mut session_rx, Duration::from_millis(200)).await;
        let types: Vec<&str> = session_events.iter().map(|(t, _)| t.as_str()).collect();
        assert!(types.contains(&"session-ready"));
        assert!(types.contains(&"session-called"));

        let office_events = collect_types(&mut office_rx, Duration::from_millis(10)).await;
        let types: Vec<&str> = office_events.iter().map(|(t, _)| t.as_str()).collect();
        assert!(types.contains(&"session-ready"));
        assert!(types.contains(&"session-called"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn queue_updates_are_throttled_with_a_trailing_flush() {
        let service = make_service();
        let broadcast = Arc::new(BroadcastManager::new());
        let cancel = spawn_bridge(
            &service,
            &broadcast,
            BridgeConfig {
                queue_update_throttle: Duration::from_millis(100),
                stats_interval: Duration::from_secs(60),
            },
        );
        let mut rx = subscriber(&broadcast, "c1", &["office:ofi_centro"]).await;

        // A burst of changes inside one throttle window.
        for name in ["Ana", "Beto", "Carla", "Dario"] {
            let _ = join(&service, "ofi_centro", name).await;
        }

        let events = collect_types(&mut rx, Duration::from_millis(250)).await;
        let snapshots = events
            .iter()
            .filter(|(t, _)| t == "queue-updated")
            .count();
        // The burst collapses into far fewer snapshots than changes, but a
        // trailing one always arrives.
        assert!(snapshots >= 1);
        assert!(snapshots <= 3, "got {snapshots} snapshots for one burst");
        cancel.cancel();
    }

    #[tokio::test]
    async fn queue_snapshot_carries_queue_and_stats() {
        let service = make_service();
        let broadcast = Arc::new(BroadcastManager::new());
        let cancel = spawn_bridge(&service, &broadcast, fast_config());
        let (tx, mut rx) = mpsc::channel(64);
        let conn = Arc::new(ClientConnection::new("c1".into(), tx));
        conn.subscribe("office:ofi_centro".into());
        broadcast.add(conn).await;

        let _ = join(&service, "ofi_centro", "Ana").await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut snapshot = None;
        while let Ok(msg) = rx.try_recv() {
            let value: Value = serde_json::from_str(&msg).unwrap();
            if value["type"] == "queue-updated" {
                snapshot = Some(value);
            }
        }
        let snapshot = snapshot.expect("no queue-updated received");
        assert_eq!(snapshot["data"]["officeId"], "ofi_centro");
        assert_eq!(snapshot["data"]["queue"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["data"]["queue"][0]["clientName"], "Ana");
        assert_eq!(snapshot["data"]["stats"]["waitingCount"], 1);
        cancel.cancel();
    }

    #[tokio::test]
    async fn stats_updates_only_cover_changed_offices() {
        let service = make_service();
        let broadcast = Arc::new(BroadcastManager::new());
        let cancel = spawn_bridge(
            &service,
            &broadcast,
            BridgeConfig {
                queue_update_throttle: Duration::from_secs(60),
                stats_interval: Duration::from_millis(80),
            },
        );
        let mut changed_rx = subscriber(&broadcast, "c1", &["office:ofi_a"]).await;
        let mut quiet_rx = subscriber(&broadcast, "c2", &["office:ofi_b"]).await;

        let _ = join(&service, "ofi_a", "Ana").await;

        let changed = collect_types(&mut changed_rx, Duration::from_millis(250)).await;
        assert!(changed.iter().any(|(t, _)| t == "stats-updated"));

        let quiet = collect_types(&mut quiet_rx, Duration::from_millis(10)).await;
        assert!(!quiet.iter().any(|(t, _)| t == "stats-updated"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn disabled_notifications_silence_the_office_topic() {
        let service = make_service();
        service
            .update_config(
                &OfficeId::from("ofi_mudo"),
                &turno_core::config::QueueConfig {
                    notifications_enabled: false,
                    ..turno_core::config::QueueConfig::default()
                },
            )
            .unwrap();
        let broadcast = Arc::new(BroadcastManager::new());
        let cancel = spawn_bridge(&service, &broadcast, fast_config());
        let mut office_rx = subscriber(&broadcast, "c1", &["office:ofi_mudo"]).await;

        let sid = join(&service, "ofi_mudo", "Ana").await;
        let session_topic = format!("session:{}", sid.as_str());
        let mut session_rx = subscriber(&broadcast, "c2", &[&session_topic]).await;
        let _ = service.mark_ready(&sid).await.unwrap();

        // The client still hears about its own session.
        let session_events = collect_types(&mut session_rx, Duration::from_millis(250)).await;
        assert!(session_events.iter().any(|(t, _)| t == "session-ready"));

        // The office topic stays silent: no delta mirror, no snapshots.
        let office_events = collect_types(&mut office_rx, Duration::from_millis(10)).await;
        assert!(office_events.is_empty(), "got {office_events:?}");
        cancel.cancel();
    }

    #[tokio::test]
    async fn expired_delta_carries_reason_and_prior_status() {
        let event = QueueEvent::SessionExpired {
            base: turno_core::events::BaseEvent::now(OfficeId::from("ofi_a")),
            session: Box::new(sample_session()),
            reason: "ready timeout".to_string(),
            prior_status: turno_core::types::SessionStatus::Ready,
        };
        let data = session_delta_data(&event);
        assert_eq!(data["reason"], "ready timeout");
        assert_eq!(data["priorStatus"], "READY");
        assert_eq!(wire_event_type(&event), Some("session-expired"));
    }

    #[tokio::test]
    async fn joined_and_queue_changed_have_no_wire_delta() {
        let base = turno_core::events::BaseEvent::now(OfficeId::from("ofi_a"));
        assert_eq!(
            wire_event_type(&QueueEvent::QueueChanged { base: base.clone() }),
            None
        );
        assert_eq!(
            wire_event_type(&QueueEvent::SessionJoined {
                base,
                session: Box::new(sample_session()),
            }),
            None
        );
    }

    fn sample_session() -> turno_core::session::QueueSession {
        turno_core::session::QueueSession {
            id: SessionId::from("sess_1"),
            office_id: OfficeId::from("ofi_a"),
            client_name: "Ana".to_string(),
            tramite_type: TramiteType::Compraventa,
            priority: Priority::Normal,
            status: turno_core::types::SessionStatus::Expired,
            position: None,
            estimated_wait_minutes: None,
            created_at: "2026-08-24T10:00:00.000Z".to_string(),
            ready_at: None,
            called_at: None,
            completed_at: None,
            expires_at: "2026-08-24T10:30:00.000Z".to_string(),
            updated_at: "2026-08-24T10:30:00.000Z".to_string(),
            metadata: serde_json::json!({}),
        }
    }
}
