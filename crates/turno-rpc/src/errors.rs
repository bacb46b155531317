//! RPC error codes and error type.

use serde_json::json;
use turno_engine::errors::QueueError;

use crate::types::RpcErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Session does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Office does not exist.
pub const OFFICE_NOT_FOUND: &str = "OFFICE_NOT_FOUND";
/// Transition not legal from the current status.
pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
/// Office is serving its concurrency limit.
pub const QUEUE_FULL: &str = "QUEUE_FULL";
/// Invalid or missing parameters.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Operation not valid for the target (bad range, non-terminal delete, ...).
pub const INVALID_OPERATION: &str = "INVALID_OPERATION";
/// Method not found in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Storage layer failure.
pub const STORE_ERROR: &str = "STORE_ERROR";
/// Broadcast channel failure.
pub const CHANNEL_ERROR: &str = "CHANNEL_ERROR";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// RPC error type returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Engine-level failure; the code comes from the inner error.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Machine-readable error code for this variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Queue(err) => err.code(),
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    #[must_use]
    pub fn to_error_body(&self) -> RpcErrorBody {
        let details = match self {
            Self::Queue(QueueError::InvalidTransition { from, to, .. }) => {
                Some(json!({ "from": from, "to": to }))
            }
            Self::Queue(QueueError::QueueFull { limit, .. }) => Some(json!({ "limit": limit })),
            _ => None,
        };
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
            details,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
