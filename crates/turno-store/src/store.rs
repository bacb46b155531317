//! High-level [`QueueStore`] API over the connection pool.
//!
//! Wraps the repositories with domain-typed methods: rows go in and out as
//! [`QueueSession`] / [`QueueConfig`], with enum tags and metadata JSON parsed
//! at this boundary. Multi-row writes (ranking batches) run inside a single
//! transaction — readers never observe a half-renumbered queue.

use serde_json::Value;
use std::str::FromStr;

use turno_core::config::QueueConfig;
use turno_core::ids::{OfficeId, SessionId};
use turno_core::session::QueueSession;
use turno_core::stats::StatusCounts;
use turno_core::types::{LifecycleAction, Priority, SessionStatus, TramiteType};

use crate::connection::{ConnectionPool, PooledConnection};
use crate::errors::{Result, StoreError};
use crate::repositories::office::OfficeConfigRepo;
use crate::repositories::session::{RankUpdate, SessionRepo, UpdateSessionFields};
use crate::row_types::SessionRow;

/// Options for creating a new queue session.
pub struct NewSessionOptions<'a> {
    /// Office whose queue the session joins.
    pub office_id: &'a OfficeId,
    /// Client display name.
    pub client_name: &'a str,
    /// Procedure type.
    pub tramite_type: TramiteType,
    /// Priority band.
    pub priority: Priority,
    /// Creation timestamp (callers compute one `now` per operation).
    pub created_at: &'a str,
    /// Expiry deadline, already derived from office config.
    pub expires_at: &'a str,
    /// Caller metadata seed. The CREATED log entry is appended to it.
    pub metadata: Option<Value>,
}

/// High-level queue store wrapping a connection pool.
pub struct QueueStore {
    pool: ConnectionPool,
}

impl QueueStore {
    /// Create a new `QueueStore` with the given connection pool.
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Create a WAITING session and record its CREATED log entry.
    ///
    /// The session is inserted unranked (`position` NULL); the engine assigns
    /// positions in the reorder that follows admission.
    pub fn create_session(&self, opts: &NewSessionOptions<'_>) -> Result<QueueSession> {
        let mut session = QueueSession {
            id: SessionId::new(),
            office_id: opts.office_id.clone(),
            client_name: opts.client_name.to_string(),
            tramite_type: opts.tramite_type,
            priority: opts.priority,
            status: SessionStatus::Waiting,
            position: None,
            estimated_wait_minutes: None,
            created_at: opts.created_at.to_string(),
            ready_at: None,
            called_at: None,
            completed_at: None,
            expires_at: opts.expires_at.to_string(),
            updated_at: opts.created_at.to_string(),
            metadata: opts.metadata.clone().unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        };
        session.push_event(LifecycleAction::Created, opts.created_at, Value::Null);

        let conn = self.conn()?;
        SessionRepo::insert(&conn, &to_row(&session)?)?;
        Ok(session)
    }

    /// Get a session by ID.
    pub fn get_session(&self, session_id: &SessionId) -> Result<Option<QueueSession>> {
        let conn = self.conn()?;
        SessionRepo::get_by_id(&conn, session_id.as_str())?
            .map(to_domain)
            .transpose()
    }

    /// Apply a partial update. Returns whether a row changed.
    pub fn update_session(
        &self,
        session_id: &SessionId,
        fields: &UpdateSessionFields<'_>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::update(&conn, session_id.as_str(), fields)
    }

    /// Delete a session outright (administrative; normal flows expire or
    /// cancel instead). Returns whether a row existed.
    pub fn delete_session(&self, session_id: &SessionId) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::delete(&conn, session_id.as_str())
    }

    /// WAITING and READY sessions for an office, in rank order.
    pub fn list_queue(&self, office_id: &OfficeId) -> Result<Vec<QueueSession>> {
        let conn = self.conn()?;
        SessionRepo::list_in_line(&conn, office_id.as_str())?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    /// Non-terminal sessions, optionally scoped to one office.
    ///
    /// `None` scans every office — the daemon uses this at boot to re-arm
    /// expiry timers for whatever survived a restart.
    pub fn list_non_terminal(&self, office_id: Option<&OfficeId>) -> Result<Vec<QueueSession>> {
        let conn = self.conn()?;
        SessionRepo::list_non_terminal(&conn, office_id.map(OfficeId::as_str))?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    /// Number of ACTIVE sessions in an office (admission control).
    pub fn count_active(&self, office_id: &OfficeId) -> Result<u32> {
        let conn = self.conn()?;
        SessionRepo::count_active(&conn, office_id.as_str())
    }

    /// Sessions completed at or after `since` for an office.
    pub fn list_completed_since(
        &self,
        office_id: &OfficeId,
        since: &str,
    ) -> Result<Vec<QueueSession>> {
        let conn = self.conn()?;
        SessionRepo::list_completed_since(&conn, office_id.as_str(), since)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    /// Non-terminal sessions whose deadline has passed (sweep input),
    /// optionally scoped to one office.
    pub fn list_expired(
        &self,
        now: &str,
        office_id: Option<&OfficeId>,
    ) -> Result<Vec<QueueSession>> {
        let conn = self.conn()?;
        SessionRepo::list_expired(&conn, now, office_id.map(OfficeId::as_str))?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    /// An office's sessions restricted to a set of statuses, oldest first.
    pub fn list_by_statuses(
        &self,
        office_id: &OfficeId,
        statuses: &[SessionStatus],
    ) -> Result<Vec<QueueSession>> {
        let conn = self.conn()?;
        SessionRepo::list_by_statuses(&conn, office_id.as_str(), statuses)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    /// Whether the office is known: it has a stored config or at least one
    /// session row (any status).
    pub fn office_exists(&self, office_id: &OfficeId) -> Result<bool> {
        let conn = self.conn()?;
        if OfficeConfigRepo::get(&conn, office_id.as_str())?.is_some() {
            return Ok(true);
        }
        SessionRepo::office_has_sessions(&conn, office_id.as_str())
    }

    /// Session counts by status for an office.
    pub fn status_counts(&self, office_id: &OfficeId) -> Result<StatusCounts> {
        let conn = self.conn()?;
        let mut counts = StatusCounts::default();
        for (tag, count) in SessionRepo::status_counts(&conn, office_id.as_str())? {
            let status = SessionStatus::from_str(&tag)
                .map_err(|message| corrupt(office_id.as_str(), message))?;
            *counts.slot(status) += count;
        }
        Ok(counts)
    }

    /// Persist a batch of ranking assignments in one transaction.
    pub fn apply_rankings(&self, updates: &[RankUpdate<'_>]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let changed = SessionRepo::apply_rankings(&tx, updates)?;
        tx.commit()?;
        Ok(changed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Office config
    // ─────────────────────────────────────────────────────────────────────

    /// Stored config for an office, if it has one.
    pub fn get_office_config(&self, office_id: &OfficeId) -> Result<Option<QueueConfig>> {
        let conn = self.conn()?;
        let Some(row) = OfficeConfigRepo::get(&conn, office_id.as_str())? else {
            return Ok(None);
        };
        let config = serde_json::from_str(&row.config).map_err(|e| StoreError::Corrupt {
            table: "office_configs",
            id: row.office_id,
            message: e.to_string(),
        })?;
        Ok(Some(config))
    }

    /// Insert or replace an office's config.
    pub fn put_office_config(&self, office_id: &OfficeId, config: &QueueConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        let conn = self.conn()?;
        OfficeConfigRepo::put(&conn, office_id.as_str(), &json)
    }

    /// All office IDs with a stored config.
    pub fn list_config_office_ids(&self) -> Result<Vec<OfficeId>> {
        let conn = self.conn()?;
        Ok(OfficeConfigRepo::list_office_ids(&conn)?
            .into_iter()
            .map(OfficeId::from_string)
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row ↔ domain conversion
// ─────────────────────────────────────────────────────────────────────────────

fn corrupt(id: &str, message: String) -> StoreError {
    StoreError::Corrupt {
        table: "queue_sessions",
        id: id.to_string(),
        message,
    }
}

fn to_domain(row: SessionRow) -> Result<QueueSession> {
    let status = SessionStatus::from_str(&row.status).map_err(|m| corrupt(&row.id, m))?;
    let priority = Priority::from_str(&row.priority).map_err(|m| corrupt(&row.id, m))?;
    let tramite_type = TramiteType::from_str(&row.tramite_type).map_err(|m| corrupt(&row.id, m))?;
    let metadata: Value =
        serde_json::from_str(&row.metadata).map_err(|e| corrupt(&row.id, e.to_string()))?;
    let position = row
        .position
        .map(|p| u32::try_from(p).map_err(|_| corrupt(&row.id, format!("bad position: {p}"))))
        .transpose()?;
    let estimated_wait_minutes = row
        .estimated_wait_minutes
        .map(|m| u32::try_from(m).map_err(|_| corrupt(&row.id, format!("bad estimate: {m}"))))
        .transpose()?;

    Ok(QueueSession {
        id: SessionId::from_string(row.id),
        office_id: OfficeId::from_string(row.office_id),
        client_name: row.client_name,
        tramite_type,
        priority,
        status,
        position,
        estimated_wait_minutes,
        created_at: row.created_at,
        ready_at: row.ready_at,
        called_at: row.called_at,
        completed_at: row.completed_at,
        expires_at: row.expires_at,
        updated_at: row.updated_at,
        metadata,
    })
}

fn to_row(session: &QueueSession) -> Result<SessionRow> {
    Ok(SessionRow {
        id: session.id.as_str().to_string(),
        office_id: session.office_id.as_str().to_string(),
        client_name: session.client_name.clone(),
        tramite_type: session.tramite_type.as_str().to_string(),
        priority: session.priority.as_str().to_string(),
        status: session.status.as_str().to_string(),
        position: session.position.map(i64::from),
        estimated_wait_minutes: session.estimated_wait_minutes.map(i64::from),
        created_at: session.created_at.clone(),
        ready_at: session.ready_at.clone(),
        called_at: session.called_at.clone(),
        completed_at: session.completed_at.clone(),
        expires_at: session.expires_at.clone(),
        updated_at: session.updated_at.clone(),
        metadata: serde_json::to_string(&session.metadata)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
