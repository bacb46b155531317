//! Error types for the queue store.
//!
//! [`StoreError`] is the primary error type returned by all store operations.
//! It keeps the surface small enough for exhaustive matching; the engine maps
//! it into its own error taxonomy at the boundary.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error (exhaustion or connect failure).
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// A stored row could not be mapped back into a domain type.
    #[error("corrupt row in {table} ({id}): {message}")]
    Corrupt {
        /// Table the row came from.
        table: &'static str,
        /// Primary key of the offending row.
        id: String,
        /// What failed to parse.
        message: String,
    },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
