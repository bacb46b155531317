//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape — not the public API types.
//! Conversion to [`QueueSession`](turno_core::session::QueueSession) happens
//! in the store layer, where enum tags and the metadata JSON are parsed.

/// Raw session row from the `queue_sessions` table.
#[derive(Clone, Debug)]
pub struct SessionRow {
    /// Session ID.
    pub id: String,
    /// Office ID.
    pub office_id: String,
    /// Client display name.
    pub client_name: String,
    /// Tramite type tag (e.g., `"COMPRAVENTA"`).
    pub tramite_type: String,
    /// Priority tag (e.g., `"NORMAL"`).
    pub priority: String,
    /// Status tag (e.g., `"WAITING"`).
    pub status: String,
    /// 1-based place in line (null off the line).
    pub position: Option<i64>,
    /// Advisory wait estimate in minutes.
    pub estimated_wait_minutes: Option<i64>,
    /// Creation timestamp.
    pub created_at: String,
    /// Ready timestamp.
    pub ready_at: Option<String>,
    /// Called timestamp.
    pub called_at: Option<String>,
    /// Completion timestamp.
    pub completed_at: Option<String>,
    /// Expiry deadline.
    pub expires_at: String,
    /// Last mutation timestamp.
    pub updated_at: String,
    /// Metadata as a JSON object string.
    pub metadata: String,
}

/// Raw office config row from the `office_configs` table.
#[derive(Clone, Debug)]
pub struct OfficeConfigRow {
    /// Office ID.
    pub office_id: String,
    /// Config as a JSON object string.
    pub config: String,
    /// Last update timestamp.
    pub updated_at: String,
}
