//! Engine events broadcast to WebSocket subscribers.
//!
//! The engine emits a [`QueueEvent`] after every committed state change. The
//! server's event bridge fans these out to `office:{id}` and `session:{id}`
//! topics, mapping internal variant names to the hyphenated wire names
//! clients subscribe to (`session-called`, `queue-updated`, ...).
//!
//! Delivery is fire-and-forget: a lagging subscriber never blocks a state
//! transition.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::OfficeId;
use crate::session::QueueSession;
use crate::types::SessionStatus;

/// Common fields for all engine events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Office whose queue the event concerns.
    pub office_id: OfficeId,
    /// When the engine emitted the event.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(office_id: OfficeId) -> Self {
        Self {
            office_id,
            timestamp: crate::time::now_rfc3339(),
        }
    }
}

/// State change notification emitted by the queue engine.
///
/// Session-scoped variants carry the full post-transition session so
/// subscribers never need a follow-up read. `QueueChanged` is office-scoped
/// and deliberately payload-free: it marks the office dirty and the bridge
/// builds one throttled queue snapshot per second at most.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// A session joined the queue.
    #[serde(rename = "session_joined")]
    SessionJoined {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The session as persisted after the transition.
        session: Box<QueueSession>,
    },

    /// A session was marked ready to be called.
    #[serde(rename = "session_ready")]
    SessionReady {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The session as persisted after the transition.
        session: Box<QueueSession>,
    },

    /// A session was called to a desk.
    #[serde(rename = "session_called")]
    SessionCalled {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The session as persisted after the transition.
        session: Box<QueueSession>,
    },

    /// A session finished service.
    #[serde(rename = "session_completed")]
    SessionCompleted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The session as persisted after the transition.
        session: Box<QueueSession>,
    },

    /// A session timed out.
    #[serde(rename = "session_expired")]
    SessionExpired {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The session as persisted after the transition.
        session: Box<QueueSession>,
        /// Which timeout fired (e.g., `"session timeout"`).
        reason: String,
        /// Status the session held before expiring.
        #[serde(rename = "priorStatus")]
        prior_status: SessionStatus,
    },

    /// A session was withdrawn.
    #[serde(rename = "session_cancelled")]
    SessionCancelled {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The session as persisted after the transition.
        session: Box<QueueSession>,
        /// Caller-supplied reason, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Positions in an office's line changed.
    #[serde(rename = "queue_changed")]
    QueueChanged {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },
}

impl QueueEvent {
    /// Get the base event fields.
    #[must_use]
    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::SessionJoined { base, .. }
            | Self::SessionReady { base, .. }
            | Self::SessionCalled { base, .. }
            | Self::SessionCompleted { base, .. }
            | Self::SessionExpired { base, .. }
            | Self::SessionCancelled { base, .. }
            | Self::QueueChanged { base, .. } => base,
        }
    }

    /// Office the event concerns.
    #[must_use]
    pub fn office_id(&self) -> &OfficeId {
        &self.base().office_id
    }

    /// The session payload, for session-scoped variants.
    #[must_use]
    pub fn session(&self) -> Option<&QueueSession> {
        match self {
            Self::SessionJoined { session, .. }
            | Self::SessionReady { session, .. }
            | Self::SessionCalled { session, .. }
            | Self::SessionCompleted { session, .. }
            | Self::SessionExpired { session, .. }
            | Self::SessionCancelled { session, .. } => Some(session),
            Self::QueueChanged { .. } => None,
        }
    }

    /// Internal variant name, matching the serde tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionJoined { .. } => "session_joined",
            Self::SessionReady { .. } => "session_ready",
            Self::SessionCalled { .. } => "session_called",
            Self::SessionCompleted { .. } => "session_completed",
            Self::SessionExpired { .. } => "session_expired",
            Self::SessionCancelled { .. } => "session_cancelled",
            Self::QueueChanged { .. } => "queue_changed",
        }
    }

    /// Serialize to a JSON value. Infallible in practice; returns an empty
    /// object if serialization somehow fails.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
