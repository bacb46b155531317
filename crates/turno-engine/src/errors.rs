//! Engine error types.

use turno_core::ids::{OfficeId, SessionId};
use turno_core::types::SessionStatus;

/// Errors that can occur during queue engine operations.
///
/// A duplicate call (completing a completed session, expiring a terminal one)
/// is not an error; the façade reports it as a benign outcome with
/// `applied = false`.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Session not found.
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// Office not found (no config and no sessions ever).
    #[error("Office not found: {0}")]
    OfficeNotFound(OfficeId),

    /// The requested transition is not legal from the session's current
    /// status.
    #[error("Invalid transition for {session_id}: {from} -> {to}")]
    InvalidTransition {
        /// Session that refused the transition.
        session_id: SessionId,
        /// Status the session held when the transition was attempted.
        from: SessionStatus,
        /// Status the transition would have produced.
        to: SessionStatus,
    },

    /// Admission refused: the office is already serving its maximum number of
    /// concurrent sessions.
    #[error("Queue full for office {office_id}: {limit} concurrent sessions")]
    QueueFull {
        /// Office that refused admission.
        office_id: OfficeId,
        /// The office's `max_concurrent_sessions` limit.
        limit: u32,
    },

    /// Invalid request (bad parameter, deleting a non-terminal session, ...).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Storage error.
    #[error("Store error: {0}")]
    Store(#[from] turno_store::StoreError),

    /// Broadcast channel error.
    #[error("Channel error: {0}")]
    Channel(String),
}

impl QueueError {
    /// Stable error code string for the wire protocol.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::OfficeNotFound(_) => "OFFICE_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::QueueFull { .. } => "QUEUE_FULL",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::Store(_) => "STORE_ERROR",
            Self::Channel(_) => "CHANNEL_ERROR",
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, QueueError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
