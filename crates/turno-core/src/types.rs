//! Domain enums for the queue engine.
//!
//! Every enum serializes to the exact `SCREAMING_SNAKE_CASE` string that the
//! wire protocol and the `queue_sessions` table store (e.g., `"WAITING"`,
//! `"CRITICAL"`, `"COMPRAVENTA"`). Domain helper methods like
//! [`SessionStatus::is_terminal()`] replace scattered string comparisons with
//! compile-time exhaustiveness.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a queue session.
///
/// `Completed`, `Expired`, and `Cancelled` are terminal: no transition ever
/// leaves them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// In line, not yet callable.
    Waiting,
    /// In line and eligible to be called next.
    Ready,
    /// Currently being served at a desk.
    Active,
    /// Service finished normally.
    Completed,
    /// Timed out (session, ready, or active timeout).
    Expired,
    /// Withdrawn by the client or staff.
    Cancelled,
}

/// All statuses, in lifecycle order. Used by stats to produce stable counts.
pub const ALL_STATUSES: [SessionStatus; 6] = [
    SessionStatus::Waiting,
    SessionStatus::Ready,
    SessionStatus::Active,
    SessionStatus::Completed,
    SessionStatus::Expired,
    SessionStatus::Cancelled,
];

impl SessionStatus {
    /// Return the canonical string representation (e.g., `"WAITING"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Ready => "READY",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether this status ends the session lifecycle.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Cancelled)
    }

    /// Whether the session occupies a position in the line.
    ///
    /// Only `WAITING` and `READY` sessions are ranked; everything else has no
    /// position.
    #[must_use]
    pub fn in_line(self) -> bool {
        matches!(self, Self::Waiting | Self::Ready)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map_err(|_| format!("unknown session status: {s}"))
    }
}

/// Priority band of a queue session.
///
/// Variant order is weight order, so `#[derive(Ord)]` gives `LOW < NORMAL <
/// HIGH < CRITICAL` directly.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Below-normal priority (e.g., non-urgent paperwork).
    Low,
    /// Default band for new sessions.
    #[default]
    Normal,
    /// Elevated priority (e.g., elderly clients, appointments).
    High,
    /// Jumps ahead of everything else.
    Critical,
}

impl Priority {
    /// Return the canonical string representation (e.g., `"NORMAL"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Numeric ordering weight. Higher weight sorts earlier in the queue.
    #[must_use]
    pub fn weight(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map_err(|_| format!("unknown priority: {s}"))
    }
}

/// Kind of notarial procedure the client is queuing for.
///
/// Drives per-tramite service time estimates; offices override the defaults in
/// [`QueueConfig::estimated_time_per_tramite`](crate::config::QueueConfig).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TramiteType {
    /// Property sale deed.
    Compraventa,
    /// Will preparation.
    Testamento,
    /// Power of attorney.
    Poder,
    /// Donation deed.
    Donacion,
    /// Company incorporation.
    Sociedad,
    /// Mortgage cancellation.
    CancelacionHipoteca,
    /// Anything else.
    Otro,
}

impl TramiteType {
    /// Return the canonical string representation (e.g., `"COMPRAVENTA"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compraventa => "COMPRAVENTA",
            Self::Testamento => "TESTAMENTO",
            Self::Poder => "PODER",
            Self::Donacion => "DONACION",
            Self::Sociedad => "SOCIEDAD",
            Self::CancelacionHipoteca => "CANCELACION_HIPOTECA",
            Self::Otro => "OTRO",
        }
    }
}

impl fmt::Display for TramiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TramiteType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map_err(|_| format!("unknown tramite type: {s}"))
    }
}

/// Action tag recorded in a session's append-only lifecycle event log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleAction {
    /// Session joined the queue.
    Created,
    /// Session marked ready to be called.
    Ready,
    /// Session called to a desk.
    Called,
    /// Service finished.
    Completed,
    /// A timeout fired (the event data records which).
    Expired,
    /// Expiry deadline pushed forward.
    Extended,
    /// Session withdrawn.
    Cancelled,
    /// Priority band changed by staff.
    PriorityChanged,
}

impl LifecycleAction {
    /// Return the canonical string representation (e.g., `"CREATED"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Ready => "READY",
            Self::Called => "CALLED",
            Self::Completed => "COMPLETED",
            Self::Expired => "EXPIRED",
            Self::Extended => "EXTENDED",
            Self::Cancelled => "CANCELLED",
            Self::PriorityChanged => "PRIORITY_CHANGED",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
