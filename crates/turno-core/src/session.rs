//! The queue session model.
//!
//! [`QueueSession`] is the row the store persists and the object the wire
//! protocol ships, camelCase field names and all. The `metadata` field is an
//! opaque JSON object except for one engine-owned key: `events`, an
//! append-only log of [`LifecycleEvent`] entries recording every transition
//! the session went through.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ids::{OfficeId, SessionId};
use crate::types::{LifecycleAction, Priority, SessionStatus, TramiteType};

/// One entry in a session's lifecycle event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    /// What happened.
    pub action: LifecycleAction,
    /// When it happened (canonical RFC 3339).
    pub at: String,
    /// Action-specific detail (reason strings, old/new priority, etc.).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// A client's place in a notary office queue.
///
/// Matches the wire format exactly:
/// ```json
/// { "id": "sess_...", "officeId": "ofi_centro", "clientName": "Ana",
///   "tramiteType": "COMPRAVENTA", "priority": "NORMAL", "status": "WAITING",
///   "position": 1, "estimatedWaitMinutes": 25, ... }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSession {
    /// Unique session ID (`sess_` + UUID v7).
    pub id: SessionId,
    /// Office whose queue this session belongs to.
    pub office_id: OfficeId,
    /// Display name of the client.
    pub client_name: String,
    /// Procedure the client is here for.
    pub tramite_type: TramiteType,
    /// Priority band.
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// 1-based place in line. `None` once the session leaves the line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Advisory wait estimate in whole minutes. `None` off the line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_minutes: Option<u32>,
    /// When the session joined the queue.
    pub created_at: String,
    /// When the session was marked ready, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<String>,
    /// When the session was called to a desk, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub called_at: Option<String>,
    /// When service finished, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Current expiry deadline. Always set; every state has a timeout.
    pub expires_at: String,
    /// Last mutation time.
    pub updated_at: String,
    /// Opaque caller metadata plus the engine-owned `events` log.
    #[serde(default)]
    pub metadata: Value,
}

impl QueueSession {
    /// Append an entry to the lifecycle event log in `metadata.events`.
    ///
    /// Creates the array if absent. If a caller stored something non-object
    /// in `metadata`, it is replaced with an object so the log always has a
    /// home; the engine never otherwise touches caller keys.
    pub fn push_event(&mut self, action: LifecycleAction, at: &str, data: Value) {
        if !self.metadata.is_object() {
            self.metadata = json!({});
        }
        let entry = LifecycleEvent {
            action,
            at: at.to_string(),
            data,
        };
        // Serializing a LifecycleEvent cannot fail; fall back to a bare tag
        // rather than poisoning the whole metadata blob.
        let entry = serde_json::to_value(&entry)
            .unwrap_or_else(|_| json!({ "action": action.as_str(), "at": at }));

        match self.metadata.get_mut("events") {
            Some(Value::Array(events)) => events.push(entry),
            _ => {
                if let Some(obj) = self.metadata.as_object_mut() {
                    let _ = obj.insert("events".to_string(), json!([entry]));
                }
            }
        }
    }

    /// Deserialize the lifecycle event log. Unreadable entries are skipped.
    #[must_use]
    pub fn event_log(&self) -> Vec<LifecycleEvent> {
        self.metadata
            .get("events")
            .and_then(Value::as_array)
            .map(|events| {
                events
                    .iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the expiry deadline has passed as of `now`.
    ///
    /// Returns `false` for terminal sessions (nothing left to expire) and for
    /// unparseable deadlines.
    #[must_use]
    pub fn is_overdue(&self, now: &str) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match (
            crate::time::parse_rfc3339(&self.expires_at),
            crate::time::parse_rfc3339(now),
        ) {
            (Some(deadline), Some(now)) => deadline <= now,
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> QueueSession {
        QueueSession {
            id: SessionId::from("sess_test"),
            office_id: OfficeId::from("ofi_centro"),
            client_name: "Ana".to_string(),
            tramite_type: TramiteType::Compraventa,
            priority: Priority::Normal,
            status: SessionStatus::Waiting,
            position: Some(1),
            estimated_wait_minutes: Some(25),
            created_at: "2026-08-24T10:00:00.000Z".to_string(),
            ready_at: None,
            called_at: None,
            completed_at: None,
            expires_at: "2026-08-24T12:00:00.000Z".to_string(),
            updated_at: "2026-08-24T10:00:00.000Z".to_string(),
            metadata: json!({}),
        }
    }

    #[test]
    fn serializes_camel_case_wire_format() {
        let session = sample_session();
        let value = serde_json::to_value(&session).unwrap();

        assert_eq!(value["officeId"], "ofi_centro");
        assert_eq!(value["clientName"], "Ana");
        assert_eq!(value["tramiteType"], "COMPRAVENTA");
        assert_eq!(value["status"], "WAITING");
        assert_eq!(value["position"], 1);
        assert_eq!(value["estimatedWaitMinutes"], 25);
        // Unset optional timestamps are omitted, not null.
        assert!(value.get("calledAt").is_none());
        assert!(value.get("completedAt").is_none());
    }

    #[test]
    fn push_event_appends_in_order() {
        let mut session = sample_session();
        session.push_event(
            LifecycleAction::Created,
            "2026-08-24T10:00:00.000Z",
            Value::Null,
        );
        session.push_event(
            LifecycleAction::Called,
            "2026-08-24T10:20:00.000Z",
            json!({ "desk": 2 }),
        );

        let log = session.event_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, LifecycleAction::Created);
        assert_eq!(log[1].action, LifecycleAction::Called);
        assert_eq!(log[1].data["desk"], 2);
    }

    #[test]
    fn push_event_preserves_caller_metadata() {
        let mut session = sample_session();
        session.metadata = json!({ "appointmentRef": "A-42" });
        session.push_event(
            LifecycleAction::Created,
            "2026-08-24T10:00:00.000Z",
            Value::Null,
        );

        assert_eq!(session.metadata["appointmentRef"], "A-42");
        assert_eq!(session.event_log().len(), 1);
    }

    #[test]
    fn push_event_recovers_from_non_object_metadata() {
        let mut session = sample_session();
        session.metadata = json!("scalar");
        session.push_event(
            LifecycleAction::Created,
            "2026-08-24T10:00:00.000Z",
            Value::Null,
        );

        assert!(session.metadata.is_object());
        assert_eq!(session.event_log().len(), 1);
    }

    #[test]
    fn event_log_empty_when_no_events() {
        let session = sample_session();
        assert!(session.event_log().is_empty());
    }

    #[test]
    fn sessions_compare_by_value() {
        let session = sample_session();
        let mut other = session.clone();
        assert_eq!(session, other);

        other.status = SessionStatus::Active;
        assert_ne!(session, other);
    }

    #[test]
    fn overdue_only_past_deadline_and_non_terminal() {
        let mut session = sample_session();
        assert!(!session.is_overdue("2026-08-24T11:59:59.999Z"));
        assert!(session.is_overdue("2026-08-24T12:00:00.000Z"));
        assert!(session.is_overdue("2026-08-24T13:00:00.000Z"));

        session.status = SessionStatus::Completed;
        assert!(!session.is_overdue("2026-08-24T13:00:00.000Z"));
    }

    #[test]
    fn missing_metadata_defaults_on_deserialize() {
        let json_str = r#"{
            "id": "sess_x", "officeId": "ofi_centro", "clientName": "Beto",
            "tramiteType": "PODER", "priority": "HIGH", "status": "ACTIVE",
            "createdAt": "2026-08-24T10:00:00.000Z",
            "expiresAt": "2026-08-24T11:00:00.000Z",
            "updatedAt": "2026-08-24T10:05:00.000Z"
        }"#;
        let session: QueueSession = serde_json::from_str(json_str).unwrap();
        assert!(session.metadata.is_null());
        assert_eq!(session.position, None);
    }
}
