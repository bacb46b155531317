//! Session repository — row-level CRUD for the `queue_sessions` table.
//!
//! Stateless: every method takes `&Connection`, so callers control
//! transaction boundaries. Domain conversion (enum tags, metadata JSON)
//! happens one layer up in [`QueueStore`](crate::store::QueueStore).

use rusqlite::{Connection, OptionalExtension, params};

use turno_core::time::now_rfc3339;
use turno_core::types::{Priority, SessionStatus};

use crate::errors::Result;
use crate::row_types::SessionRow;

/// Statuses that occupy a place in the line.
const IN_LINE: &str = "('WAITING', 'READY')";

/// Statuses that have not reached a terminal state.
const NON_TERMINAL: &str = "('WAITING', 'READY', 'ACTIVE')";

/// Partial update for a session row.
///
/// `None` leaves a column untouched. The nested options (`position`,
/// `estimated_wait_minutes`) distinguish "set to NULL" from "leave alone".
/// `updated_at` is always bumped.
#[derive(Default)]
pub struct UpdateSessionFields<'a> {
    /// New status tag.
    pub status: Option<SessionStatus>,
    /// New priority band.
    pub priority: Option<Priority>,
    /// New position, or `Some(None)` to clear it.
    pub position: Option<Option<u32>>,
    /// New wait estimate, or `Some(None)` to clear it.
    pub estimated_wait_minutes: Option<Option<u32>>,
    /// Set the ready timestamp.
    pub ready_at: Option<&'a str>,
    /// Set the called timestamp.
    pub called_at: Option<&'a str>,
    /// Set the completion timestamp.
    pub completed_at: Option<&'a str>,
    /// Move the expiry deadline.
    pub expires_at: Option<&'a str>,
    /// Replace the metadata JSON (pre-serialized object string).
    pub metadata: Option<&'a str>,
}

impl UpdateSessionFields<'_> {
    /// Whether this update would change any column.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.position.is_none()
            && self.estimated_wait_minutes.is_none()
            && self.ready_at.is_none()
            && self.called_at.is_none()
            && self.completed_at.is_none()
            && self.expires_at.is_none()
            && self.metadata.is_none()
    }
}

/// One ranking assignment produced by a queue reorder.
#[derive(Clone, Copy, Debug)]
pub struct RankUpdate<'a> {
    /// Session to update.
    pub session_id: &'a str,
    /// New 1-based position.
    pub position: u32,
    /// New wait estimate in whole minutes.
    pub estimated_wait_minutes: u32,
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a fully built session row.
    pub fn insert(conn: &Connection, row: &SessionRow) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO queue_sessions (id, office_id, client_name, tramite_type, priority,
             status, position, estimated_wait_minutes, created_at, ready_at, called_at,
             completed_at, expires_at, updated_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                row.id,
                row.office_id,
                row.client_name,
                row.tramite_type,
                row.priority,
                row.status,
                row.position,
                row.estimated_wait_minutes,
                row.created_at,
                row.ready_at,
                row.called_at,
                row.completed_at,
                row.expires_at,
                row.updated_at,
                row.metadata,
            ],
        )?;
        Ok(())
    }

    /// Get session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM queue_sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Apply a partial update. Returns whether a row changed.
    pub fn update(
        conn: &Connection,
        session_id: &str,
        fields: &UpdateSessionFields<'_>,
    ) -> Result<bool> {
        if fields.is_empty() {
            return Ok(false);
        }

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        let mut push = |column: &str, value: Box<dyn rusqlite::types::ToSql>| {
            values.push(value);
            sets.push(format!("{column} = ?{}", values.len()));
        };

        if let Some(status) = fields.status {
            push("status", Box::new(status.as_str()));
        }
        if let Some(priority) = fields.priority {
            push("priority", Box::new(priority.as_str()));
        }
        if let Some(position) = fields.position {
            push("position", Box::new(position.map(i64::from)));
        }
        if let Some(estimate) = fields.estimated_wait_minutes {
            push("estimated_wait_minutes", Box::new(estimate.map(i64::from)));
        }
        if let Some(ready_at) = fields.ready_at {
            push("ready_at", Box::new(ready_at.to_string()));
        }
        if let Some(called_at) = fields.called_at {
            push("called_at", Box::new(called_at.to_string()));
        }
        if let Some(completed_at) = fields.completed_at {
            push("completed_at", Box::new(completed_at.to_string()));
        }
        if let Some(expires_at) = fields.expires_at {
            push("expires_at", Box::new(expires_at.to_string()));
        }
        if let Some(metadata) = fields.metadata {
            push("metadata", Box::new(metadata.to_string()));
        }
        push("updated_at", Box::new(now_rfc3339()));

        values.push(Box::new(session_id.to_string()));
        let sql = format!(
            "UPDATE queue_sessions SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(Box::as_ref).collect();
        let changed = conn.execute(&sql, params_refs.as_slice())?;
        Ok(changed > 0)
    }

    /// Delete a session row. Returns whether a row existed.
    pub fn delete(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM queue_sessions WHERE id = ?1",
            params![session_id],
        )?;
        Ok(changed > 0)
    }

    /// List WAITING and READY sessions for an office in rank order.
    ///
    /// Unranked rows (position NULL, e.g., just inserted) come last, oldest
    /// first, so a reorder pass sees a stable input order.
    pub fn list_in_line(conn: &Connection, office_id: &str) -> Result<Vec<SessionRow>> {
        let sql = format!(
            "SELECT * FROM queue_sessions
             WHERE office_id = ?1 AND status IN {IN_LINE}
             ORDER BY position IS NULL, position ASC, created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![office_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List non-terminal sessions, optionally scoped to one office.
    pub fn list_non_terminal(
        conn: &Connection,
        office_id: Option<&str>,
    ) -> Result<Vec<SessionRow>> {
        let rows = match office_id {
            Some(office_id) => {
                let sql = format!(
                    "SELECT * FROM queue_sessions
                     WHERE office_id = ?1 AND status IN {NON_TERMINAL}
                     ORDER BY created_at ASC, id ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(params![office_id], Self::map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT * FROM queue_sessions
                     WHERE status IN {NON_TERMINAL}
                     ORDER BY created_at ASC, id ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map([], Self::map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    /// Count ACTIVE sessions for an office (admission control).
    pub fn count_active(conn: &Connection, office_id: &str) -> Result<u32> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue_sessions WHERE office_id = ?1 AND status = 'ACTIVE'",
            params![office_id],
            |row| row.get(0),
        )?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// List sessions completed at or after `since` for an office.
    pub fn list_completed_since(
        conn: &Connection,
        office_id: &str,
        since: &str,
    ) -> Result<Vec<SessionRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM queue_sessions
             WHERE office_id = ?1 AND status = 'COMPLETED' AND completed_at >= ?2
             ORDER BY completed_at ASC",
        )?;
        let rows = stmt
            .query_map(params![office_id, since], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List non-terminal sessions whose deadline has passed, optionally
    /// scoped to one office.
    ///
    /// Relies on timestamps being fixed-width RFC 3339, where string order is
    /// time order.
    pub fn list_expired(
        conn: &Connection,
        now: &str,
        office_id: Option<&str>,
    ) -> Result<Vec<SessionRow>> {
        let rows = match office_id {
            Some(office_id) => {
                let sql = format!(
                    "SELECT * FROM queue_sessions
                     WHERE office_id = ?1 AND status IN {NON_TERMINAL} AND expires_at <= ?2
                     ORDER BY expires_at ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(params![office_id, now], Self::map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT * FROM queue_sessions
                     WHERE status IN {NON_TERMINAL} AND expires_at <= ?1
                     ORDER BY office_id ASC, expires_at ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(params![now], Self::map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    /// List an office's sessions restricted to a set of statuses, oldest
    /// first.
    pub fn list_by_statuses(
        conn: &Connection,
        office_id: &str,
        statuses: &[SessionStatus],
    ) -> Result<Vec<SessionRow>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (0..statuses.len())
            .map(|i| format!("?{}", i + 2))
            .collect();
        let sql = format!(
            "SELECT * FROM queue_sessions
             WHERE office_id = ?1 AND status IN ({})
             ORDER BY created_at ASC, id ASC",
            placeholders.join(", ")
        );
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(office_id.to_string())];
        for status in statuses {
            values.push(Box::new(status.as_str()));
        }
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(Box::as_ref).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Whether any session row references the office.
    pub fn office_has_sessions(conn: &Connection, office_id: &str) -> Result<bool> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM queue_sessions WHERE office_id = ?1)",
            params![office_id],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// Count sessions by status for an office.
    pub fn status_counts(conn: &Connection, office_id: &str) -> Result<Vec<(String, u32)>> {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM queue_sessions WHERE office_id = ?1 GROUP BY status",
        )?;
        let rows = stmt
            .query_map(params![office_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(|(status, count)| (status, u32::try_from(count).unwrap_or(u32::MAX)))
            .collect())
    }

    /// Apply a batch of ranking assignments. Returns rows changed.
    ///
    /// Callers wrap this in a transaction so readers never observe a
    /// half-renumbered queue.
    pub fn apply_rankings(conn: &Connection, updates: &[RankUpdate<'_>]) -> Result<usize> {
        let now = now_rfc3339();
        let mut stmt = conn.prepare(
            "UPDATE queue_sessions
             SET position = ?1, estimated_wait_minutes = ?2, updated_at = ?3
             WHERE id = ?4",
        )?;
        let mut changed = 0;
        for update in updates {
            changed += stmt.execute(params![
                i64::from(update.position),
                i64::from(update.estimated_wait_minutes),
                now,
                update.session_id,
            ])?;
        }
        Ok(changed)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get("id")?,
            office_id: row.get("office_id")?,
            client_name: row.get("client_name")?,
            tramite_type: row.get("tramite_type")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            position: row.get("position")?,
            estimated_wait_minutes: row.get("estimated_wait_minutes")?,
            created_at: row.get("created_at")?,
            ready_at: row.get("ready_at")?,
            called_at: row.get("called_at")?,
            completed_at: row.get("completed_at")?,
            expires_at: row.get("expires_at")?,
            updated_at: row.get("updated_at")?,
            metadata: row.get("metadata")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
