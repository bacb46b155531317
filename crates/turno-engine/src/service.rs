//! The [`QueueService`] façade.
//!
//! Every caller — RPC handlers, timers, the sweep — goes through this one
//! service object, constructed once in `main` and shared as `Arc`. Each
//! mutating operation follows the same shape: acquire the office lock, read
//! the current session, evaluate the transition gate, write the store,
//! recompute the ranking, then release the lock and broadcast. A session
//! whose deadline already passed is expired in place before any other
//! transition is considered.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use turno_core::config::QueueConfig;
use turno_core::events::{BaseEvent, QueueEvent};
use turno_core::ids::{OfficeId, SessionId};
use turno_core::session::QueueSession;
use turno_core::stats::QueueStats;
use turno_core::time;
use turno_core::types::{LifecycleAction, Priority, SessionStatus, TramiteType};
use turno_store::{NewSessionOptions, QueueStore, RankUpdate, StoreError, UpdateSessionFields};

use crate::config_cache::ConfigCache;
use crate::emitter::EventEmitter;
use crate::errors::{QueueError, Result};
use crate::lifecycle::{self, Gate, Transition};
use crate::locks::OfficeLocks;
use crate::ordering;
use crate::stats;
use crate::timers::TimerService;

/// Upper bound for `extend` minutes and timeout overrides (one day).
pub const MAX_EXTEND_MINUTES: u32 = 1440;

/// Backoff before the single retry of an idempotent read on pool exhaustion.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Statuses a queue listing covers by default.
const NON_TERMINAL: [SessionStatus; 3] = [
    SessionStatus::Waiting,
    SessionStatus::Ready,
    SessionStatus::Active,
];

/// Tuning handed to [`QueueService::new`], sourced from settings in the
/// daemon and defaulted in tests.
#[derive(Clone, Debug)]
pub struct ServiceOptions {
    /// Config used for offices with no stored row.
    pub defaults: QueueConfig,
    /// How long a cached office config stays fresh.
    pub config_cache_ttl: Duration,
    /// Trailing window for stats aggregates, in hours.
    pub stats_window_hours: u32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            defaults: QueueConfig::default(),
            config_cache_ttl: Duration::from_secs(60),
            stats_window_hours: 24,
        }
    }
}

/// Everything needed to admit a client to a queue.
#[derive(Clone, Debug)]
pub struct JoinRequest {
    /// Office whose queue to join.
    pub office_id: OfficeId,
    /// Client display name. Must be non-blank.
    pub client_name: String,
    /// Procedure type.
    pub tramite_type: TramiteType,
    /// Priority band.
    pub priority: Priority,
    /// Overrides the office's `session_timeout_minutes` for this session.
    pub timeout_override_minutes: Option<u32>,
    /// Opaque caller metadata seed.
    pub metadata: Option<Value>,
}

/// Result of a mutating operation.
///
/// `applied = false` is the benign duplicate case: the session was already
/// where the operation would have put it, nothing was written, no event was
/// emitted.
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    /// The session after the operation (unchanged when `applied = false`).
    pub session: QueueSession,
    /// Whether this call performed the transition.
    pub applied: bool,
}

/// Sort order for [`QueueService::get_queue`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueSort {
    /// The serving order: priority desc, then arrival, then id.
    #[default]
    Queue,
    /// Plain arrival order.
    Created,
}

/// The queue engine façade. One per process.
pub struct QueueService {
    store: Arc<QueueStore>,
    configs: ConfigCache,
    locks: OfficeLocks,
    timers: TimerService,
    emitter: EventEmitter,
    stats_window_hours: u32,
}

impl QueueService {
    /// Build the service over an already-migrated store.
    #[must_use]
    pub fn new(store: Arc<QueueStore>, options: ServiceOptions) -> Self {
        let configs = ConfigCache::new(
            Arc::clone(&store),
            options.defaults,
            options.config_cache_ttl,
        );
        Self {
            store,
            configs,
            locks: OfficeLocks::new(),
            timers: TimerService::new(),
            emitter: EventEmitter::new(),
            stats_window_hours: options.stats_window_hours,
        }
    }

    /// Subscribe to all events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.emitter.subscribe()
    }

    /// Cancel every pending expiry timer. Called once at shutdown.
    pub fn shutdown(&self) {
        self.timers.cancel_all();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Admission
    // ─────────────────────────────────────────────────────────────────────

    /// Admit a client: create a WAITING session, rank it, arm its timer.
    ///
    /// The line itself is unbounded; capacity is enforced at [`activate`]
    /// time, not here.
    ///
    /// [`activate`]: Self::activate
    pub async fn join_queue(self: &Arc<Self>, request: JoinRequest) -> Result<QueueSession> {
        let JoinRequest {
            office_id,
            client_name,
            tramite_type,
            priority,
            timeout_override_minutes,
            metadata,
        } = request;

        let client_name = client_name.trim().to_string();
        if client_name.is_empty() {
            return Err(QueueError::InvalidOperation(
                "clientName must not be blank".to_string(),
            ));
        }
        if let Some(minutes) = timeout_override_minutes {
            check_minutes_range("timeout override", minutes)?;
        }
        if let Some(seed) = &metadata {
            if !seed.is_object() {
                return Err(QueueError::InvalidOperation(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        }

        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now_dt = Utc::now();
        let now = time::to_rfc3339(now_dt);
        let timeout = timeout_override_minutes.unwrap_or(config.session_timeout_minutes);
        let expires_at = time::plus_minutes(now_dt, timeout);

        let created = self.store.create_session(&NewSessionOptions {
            office_id: &office_id,
            client_name: &client_name,
            tramite_type,
            priority,
            created_at: &now,
            expires_at: &expires_at,
            metadata,
        })?;
        self.reorder(&office_id, &config, &now)?;
        let session = self.load(&created.id)?;
        self.arm_timer(&session.id, &expires_at);
        drop(guard);

        debug!(session_id = %session.id, office_id = %office_id, "session joined queue");
        self.emit_all(vec![
            QueueEvent::SessionJoined {
                base: base_at(&office_id, &now),
                session: Box::new(session.clone()),
            },
            QueueEvent::QueueChanged {
                base: base_at(&office_id, &now),
            },
        ]);
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// WAITING → READY: the operator calls the client forward.
    pub async fn mark_ready(self: &Arc<Self>, session_id: &SessionId) -> Result<TransitionOutcome> {
        let office_id = self.load(session_id)?.office_id;
        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now_dt = Utc::now();
        let now = time::to_rfc3339(now_dt);
        let mut session = self.load(session_id)?;

        if let Some(events) = self.guard_overdue(&mut session, &config, &now)? {
            drop(guard);
            self.emit_all(events);
            return Err(invalid(session_id, SessionStatus::Expired, SessionStatus::Ready));
        }
        match lifecycle::check(session.status, Transition::Ready) {
            Gate::AlreadyThere => {
                return Ok(TransitionOutcome {
                    session,
                    applied: false,
                });
            }
            Gate::Rejected => {
                return Err(invalid(session_id, session.status, SessionStatus::Ready));
            }
            Gate::Allowed => {}
        }

        let expires_at = time::plus_minutes(now_dt, config.ready_timeout_minutes);
        session.push_event(LifecycleAction::Ready, &now, Value::Null);
        let metadata = metadata_json(&session)?;
        self.apply_update(
            session_id,
            &UpdateSessionFields {
                status: Some(SessionStatus::Ready),
                ready_at: Some(&now),
                expires_at: Some(&expires_at),
                metadata: Some(&metadata),
                ..UpdateSessionFields::default()
            },
        )?;
        self.reorder(&office_id, &config, &now)?;
        let session = self.load(session_id)?;
        self.arm_timer(session_id, &expires_at);
        drop(guard);

        self.emit_all(vec![
            QueueEvent::SessionReady {
                base: base_at(&office_id, &now),
                session: Box::new(session.clone()),
            },
            QueueEvent::QueueChanged {
                base: base_at(&office_id, &now),
            },
        ]);
        Ok(TransitionOutcome {
            session,
            applied: true,
        })
    }

    /// WAITING | READY → ACTIVE: service starts at a desk.
    ///
    /// Refused with [`QueueError::QueueFull`] when the office is already
    /// serving `max_concurrent_sessions` clients; the refused session is
    /// left untouched.
    pub async fn activate(self: &Arc<Self>, session_id: &SessionId) -> Result<TransitionOutcome> {
        let office_id = self.load(session_id)?.office_id;
        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now_dt = Utc::now();
        let now = time::to_rfc3339(now_dt);
        let mut session = self.load(session_id)?;

        if let Some(events) = self.guard_overdue(&mut session, &config, &now)? {
            drop(guard);
            self.emit_all(events);
            return Err(invalid(session_id, SessionStatus::Expired, SessionStatus::Active));
        }
        match lifecycle::check(session.status, Transition::Activate) {
            Gate::AlreadyThere => {
                return Ok(TransitionOutcome {
                    session,
                    applied: false,
                });
            }
            Gate::Rejected => {
                return Err(invalid(session_id, session.status, SessionStatus::Active));
            }
            Gate::Allowed => {}
        }

        let active = self.store.count_active(&office_id)?;
        if active >= config.max_concurrent_sessions {
            return Err(QueueError::QueueFull {
                office_id,
                limit: config.max_concurrent_sessions,
            });
        }

        let expires_at = time::plus_minutes(now_dt, config.active_timeout_minutes);
        session.push_event(LifecycleAction::Called, &now, Value::Null);
        let metadata = metadata_json(&session)?;
        self.apply_update(
            session_id,
            &UpdateSessionFields {
                status: Some(SessionStatus::Active),
                called_at: Some(&now),
                position: Some(None),
                estimated_wait_minutes: Some(None),
                expires_at: Some(&expires_at),
                metadata: Some(&metadata),
                ..UpdateSessionFields::default()
            },
        )?;
        self.reorder(&office_id, &config, &now)?;
        let session = self.load(session_id)?;
        self.arm_timer(session_id, &expires_at);
        drop(guard);

        self.emit_all(vec![
            QueueEvent::SessionCalled {
                base: base_at(&office_id, &now),
                session: Box::new(session.clone()),
            },
            QueueEvent::QueueChanged {
                base: base_at(&office_id, &now),
            },
        ]);
        Ok(TransitionOutcome {
            session,
            applied: true,
        })
    }

    /// ACTIVE → COMPLETED. Records wait/service minutes in the session
    /// metadata and shallow-merges `extra` into it (caller keys win; the
    /// `events` log is never overwritten).
    pub async fn complete(
        &self,
        session_id: &SessionId,
        extra: Option<Value>,
    ) -> Result<TransitionOutcome> {
        if let Some(extra) = &extra {
            if !extra.is_object() {
                return Err(QueueError::InvalidOperation(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        }

        let office_id = self.load(session_id)?.office_id;
        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now = time::now_rfc3339();
        let mut session = self.load(session_id)?;

        if let Some(events) = self.guard_overdue(&mut session, &config, &now)? {
            drop(guard);
            self.emit_all(events);
            return Err(invalid(session_id, SessionStatus::Expired, SessionStatus::Completed));
        }
        match lifecycle::check(session.status, Transition::Complete) {
            Gate::AlreadyThere => {
                return Ok(TransitionOutcome {
                    session,
                    applied: false,
                });
            }
            Gate::Rejected => {
                return Err(invalid(session_id, session.status, SessionStatus::Completed));
            }
            Gate::Allowed => {}
        }

        // Total time in the system, join to completion. The stats module's
        // created->called wait metric is a different number on purpose.
        let total_wait_minutes = time::minutes_between(&session.created_at, &now).map(round1);
        let service_minutes = session
            .called_at
            .as_deref()
            .and_then(|called| time::minutes_between(called, &now))
            .map(round1);

        session.push_event(
            LifecycleAction::Completed,
            &now,
            json!({ "totalWaitMinutes": total_wait_minutes, "serviceTimeMinutes": service_minutes }),
        );
        if let Some(object) = session.metadata.as_object_mut() {
            if let Some(minutes) = total_wait_minutes {
                let _ = object.insert("totalWaitMinutes".to_string(), json!(minutes));
            }
            if let Some(minutes) = service_minutes {
                let _ = object.insert("serviceTimeMinutes".to_string(), json!(minutes));
            }
            if let Some(Value::Object(extra)) = extra {
                for (key, value) in extra {
                    if key != "events" {
                        let _ = object.insert(key, value);
                    }
                }
            }
        }
        let metadata = metadata_json(&session)?;
        self.apply_update(
            session_id,
            &UpdateSessionFields {
                status: Some(SessionStatus::Completed),
                completed_at: Some(&now),
                position: Some(None),
                estimated_wait_minutes: Some(None),
                metadata: Some(&metadata),
                ..UpdateSessionFields::default()
            },
        )?;
        let _ = self.timers.disarm(session_id);
        self.reorder(&office_id, &config, &now)?;
        let session = self.load(session_id)?;
        drop(guard);

        self.emit_all(vec![
            QueueEvent::SessionCompleted {
                base: base_at(&office_id, &now),
                session: Box::new(session.clone()),
            },
            QueueEvent::QueueChanged {
                base: base_at(&office_id, &now),
            },
        ]);
        Ok(TransitionOutcome {
            session,
            applied: true,
        })
    }

    /// Non-terminal → CANCELLED with an optional reason.
    pub async fn cancel(
        &self,
        session_id: &SessionId,
        reason: Option<String>,
    ) -> Result<TransitionOutcome> {
        let office_id = self.load(session_id)?.office_id;
        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now = time::now_rfc3339();
        let mut session = self.load(session_id)?;

        if let Some(events) = self.guard_overdue(&mut session, &config, &now)? {
            drop(guard);
            self.emit_all(events);
            return Err(invalid(session_id, SessionStatus::Expired, SessionStatus::Cancelled));
        }
        match lifecycle::check(session.status, Transition::Cancel) {
            Gate::AlreadyThere => {
                return Ok(TransitionOutcome {
                    session,
                    applied: false,
                });
            }
            Gate::Rejected => {
                return Err(invalid(session_id, session.status, SessionStatus::Cancelled));
            }
            Gate::Allowed => {}
        }

        session.push_event(
            LifecycleAction::Cancelled,
            &now,
            json!({ "reason": reason }),
        );
        let metadata = metadata_json(&session)?;
        self.apply_update(
            session_id,
            &UpdateSessionFields {
                status: Some(SessionStatus::Cancelled),
                position: Some(None),
                estimated_wait_minutes: Some(None),
                metadata: Some(&metadata),
                ..UpdateSessionFields::default()
            },
        )?;
        let _ = self.timers.disarm(session_id);
        self.reorder(&office_id, &config, &now)?;
        let session = self.load(session_id)?;
        drop(guard);

        self.emit_all(vec![
            QueueEvent::SessionCancelled {
                base: base_at(&office_id, &now),
                session: Box::new(session.clone()),
                reason,
            },
            QueueEvent::QueueChanged {
                base: base_at(&office_id, &now),
            },
        ]);
        Ok(TransitionOutcome {
            session,
            applied: true,
        })
    }

    /// Non-terminal → EXPIRED. Benign on any terminal status — a timer
    /// firing against a finished session is normal operation.
    pub async fn expire(&self, session_id: &SessionId) -> Result<TransitionOutcome> {
        let office_id = self.load(session_id)?.office_id;
        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now = time::now_rfc3339();
        let mut session = self.load(session_id)?;

        match lifecycle::check(session.status, Transition::Expire) {
            Gate::AlreadyThere => {
                return Ok(TransitionOutcome {
                    session,
                    applied: false,
                });
            }
            Gate::Rejected => {
                return Err(invalid(session_id, session.status, SessionStatus::Expired));
            }
            Gate::Allowed => {}
        }

        let expired = self.apply_expire(&mut session, &now)?;
        self.reorder(&office_id, &config, &now)?;
        let session = self.load(session_id)?;
        drop(guard);

        self.emit_all(vec![
            expired,
            QueueEvent::QueueChanged {
                base: base_at(&office_id, &now),
            },
        ]);
        Ok(TransitionOutcome {
            session,
            applied: true,
        })
    }

    /// Push the deadline out by `minutes` (1..=1440) without changing
    /// status. The new deadline is `max(expires_at, now) + minutes`, so it
    /// always lands in the future.
    pub async fn extend(
        self: &Arc<Self>,
        session_id: &SessionId,
        minutes: u32,
    ) -> Result<TransitionOutcome> {
        check_minutes_range("extend minutes", minutes)?;

        let office_id = self.load(session_id)?.office_id;
        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now_dt = Utc::now();
        let now = time::to_rfc3339(now_dt);
        let mut session = self.load(session_id)?;

        let requested_from = session.status;
        if let Some(events) = self.guard_overdue(&mut session, &config, &now)? {
            drop(guard);
            self.emit_all(events);
            return Err(invalid(session_id, SessionStatus::Expired, requested_from));
        }
        if session.status.is_terminal() {
            return Err(invalid(session_id, session.status, session.status));
        }

        let base = time::parse_rfc3339(&session.expires_at)
            .map_or(now_dt, |deadline| deadline.max(now_dt));
        let expires_at = time::plus_minutes(base, minutes);
        session.push_event(
            LifecycleAction::Extended,
            &now,
            json!({ "minutesAdded": minutes, "newExpiresAt": expires_at }),
        );
        let metadata = metadata_json(&session)?;
        self.apply_update(
            session_id,
            &UpdateSessionFields {
                expires_at: Some(&expires_at),
                metadata: Some(&metadata),
                ..UpdateSessionFields::default()
            },
        )?;
        let session = self.load(session_id)?;
        self.arm_timer(session_id, &expires_at);
        drop(guard);

        // Order is unchanged, only the deadline moved.
        self.emit_all(vec![QueueEvent::QueueChanged {
            base: base_at(&office_id, &now),
        }]);
        Ok(TransitionOutcome {
            session,
            applied: true,
        })
    }

    /// Replace a non-terminal session's priority band and reorder the line.
    pub async fn set_priority(
        &self,
        session_id: &SessionId,
        priority: Priority,
    ) -> Result<TransitionOutcome> {
        let office_id = self.load(session_id)?.office_id;
        let config = self.configs.get(&office_id)?;
        let guard = self.locks.acquire(&office_id).await;
        let now = time::now_rfc3339();
        let mut session = self.load(session_id)?;

        let requested_from = session.status;
        if let Some(events) = self.guard_overdue(&mut session, &config, &now)? {
            drop(guard);
            self.emit_all(events);
            return Err(invalid(session_id, SessionStatus::Expired, requested_from));
        }
        if session.status.is_terminal() {
            return Err(invalid(session_id, session.status, session.status));
        }
        if session.priority == priority {
            return Ok(TransitionOutcome {
                session,
                applied: false,
            });
        }

        session.push_event(
            LifecycleAction::PriorityChanged,
            &now,
            json!({ "from": session.priority, "to": priority }),
        );
        let metadata = metadata_json(&session)?;
        self.apply_update(
            session_id,
            &UpdateSessionFields {
                priority: Some(priority),
                metadata: Some(&metadata),
                ..UpdateSessionFields::default()
            },
        )?;
        self.reorder(&office_id, &config, &now)?;
        let session = self.load(session_id)?;
        drop(guard);

        self.emit_all(vec![QueueEvent::QueueChanged {
            base: base_at(&office_id, &now),
        }]);
        Ok(TransitionOutcome {
            session,
            applied: true,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Fetch one session.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<QueueSession> {
        self.with_read_retry(|| self.load(session_id)).await
    }

    /// The session's persisted 1-based place in line.
    ///
    /// Fails with `InvalidOperation` for sessions that are not WAITING or
    /// READY (they hold no place).
    pub async fn get_position(&self, session_id: &SessionId) -> Result<u32> {
        let session = self.get_session(session_id).await?;
        session.position.ok_or_else(|| {
            QueueError::InvalidOperation(format!(
                "session {session_id} is {} and holds no queue position",
                session.status
            ))
        })
    }

    /// List an office's sessions.
    ///
    /// `statuses` defaults to the non-terminal set; `sort` picks the serving
    /// order or plain arrival order.
    pub async fn get_queue(
        &self,
        office_id: &OfficeId,
        statuses: Option<&[SessionStatus]>,
        sort: QueueSort,
    ) -> Result<Vec<QueueSession>> {
        let config = self.configs.get(office_id)?;
        self.with_read_retry(|| {
            if !self.store.office_exists(office_id)? {
                return Err(QueueError::OfficeNotFound(office_id.clone()));
            }
            let mut sessions = self
                .store
                .list_by_statuses(office_id, statuses.unwrap_or(&NON_TERMINAL))?;
            if sort == QueueSort::Queue {
                ordering::sort_queue(&mut sessions, config.priority_enabled);
            }
            Ok(sessions)
        })
        .await
    }

    /// Compute a fresh stats snapshot for the office.
    pub async fn get_stats(&self, office_id: &OfficeId) -> Result<QueueStats> {
        self.with_read_retry(|| {
            if !self.store.office_exists(office_id)? {
                return Err(QueueError::OfficeNotFound(office_id.clone()));
            }
            let now = time::now_rfc3339();
            stats::compute(&self.store, office_id, self.stats_window_hours, &now)
        })
        .await
    }

    /// Sessions currently WAITING across all offices (health reporting).
    pub fn waiting_session_count(&self) -> Result<u32> {
        let waiting = self
            .store
            .list_non_terminal(None)?
            .iter()
            .filter(|s| s.status == SessionStatus::Waiting)
            .count();
        Ok(u32::try_from(waiting).unwrap_or(u32::MAX))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────

    /// Expire every overdue non-terminal session, optionally scoped to one
    /// office. Safety net behind the per-session timers; returns how many
    /// sessions this call expired.
    pub async fn sweep_expired(&self, office_id: Option<&OfficeId>) -> Result<u32> {
        let now = time::now_rfc3339();
        let overdue = self.store.list_expired(&now, office_id)?;
        if overdue.is_empty() {
            return Ok(0);
        }

        // Group per office: one lock + one reorder per affected office.
        let mut by_office: Vec<(OfficeId, Vec<SessionId>)> = Vec::new();
        for session in overdue {
            match by_office.iter_mut().find(|(o, _)| *o == session.office_id) {
                Some((_, ids)) => ids.push(session.id),
                None => by_office.push((session.office_id, vec![session.id])),
            }
        }

        let mut swept = 0u32;
        let mut events = Vec::new();
        for (office_id, session_ids) in by_office {
            let config = self.configs.get(&office_id)?;
            let guard = self.locks.acquire(&office_id).await;
            let now = time::now_rfc3339();
            let mut office_changed = false;
            for session_id in &session_ids {
                let Some(mut session) = self.store.get_session(session_id)? else {
                    continue;
                };
                // Rescued or finished since the scan: leave it alone.
                if !session.is_overdue(&now) {
                    continue;
                }
                events.push(self.apply_expire(&mut session, &now)?);
                swept += 1;
                office_changed = true;
            }
            if office_changed {
                self.reorder(&office_id, &config, &now)?;
                events.push(QueueEvent::QueueChanged {
                    base: base_at(&office_id, &now),
                });
            }
            drop(guard);
        }

        self.emit_all(events);
        Ok(swept)
    }

    /// Administrative purge of a terminal session.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let office_id = self.load(session_id)?.office_id;
        let guard = self.locks.acquire(&office_id).await;
        let session = self.load(session_id)?;
        if !session.status.is_terminal() {
            return Err(QueueError::InvalidOperation(format!(
                "cannot delete session {session_id} while {}",
                session.status
            )));
        }
        let _ = self.timers.disarm(session_id);
        let deleted = self.store.delete_session(session_id)?;
        drop(guard);
        if deleted {
            Ok(())
        } else {
            Err(QueueError::NotFound(session_id.clone()))
        }
    }

    /// Re-arm a timer for every persisted non-terminal session. Run once at
    /// boot; already-overdue sessions fire immediately and go through the
    /// normal expiry path.
    pub fn rearm_timers(self: &Arc<Self>) -> Result<u32> {
        let sessions = self.store.list_non_terminal(None)?;
        for session in &sessions {
            self.arm_timer(&session.id, &session.expires_at);
        }
        let count = u32::try_from(sessions.len()).unwrap_or(u32::MAX);
        if count > 0 {
            debug!(count, "re-armed expiry timers from persisted sessions");
        }
        Ok(count)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Office config
    // ─────────────────────────────────────────────────────────────────────

    /// The office's effective config (stored row or defaults).
    pub fn get_config(&self, office_id: &OfficeId) -> Result<QueueConfig> {
        self.configs.get(office_id)
    }

    /// Validate and persist a new office config.
    pub fn update_config(&self, office_id: &OfficeId, config: &QueueConfig) -> Result<()> {
        validate_config(config)?;
        self.configs.update(office_id, config)?;
        self.emit_all(vec![QueueEvent::QueueChanged {
            base: BaseEvent::now(office_id.clone()),
        }]);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn load(&self, session_id: &SessionId) -> Result<QueueSession> {
        self.store
            .get_session(session_id)?
            .ok_or_else(|| QueueError::NotFound(session_id.clone()))
    }

    /// One retry with a short backoff on pool exhaustion; idempotent reads
    /// only.
    async fn with_read_retry<T>(&self, op: impl Fn() -> Result<T>) -> Result<T> {
        match op() {
            Err(QueueError::Store(StoreError::Pool(error))) => {
                warn!(%error, "pool exhausted, retrying read once");
                tokio::time::sleep(READ_RETRY_BACKOFF).await;
                op()
            }
            other => other,
        }
    }

    fn apply_update(&self, session_id: &SessionId, fields: &UpdateSessionFields<'_>) -> Result<()> {
        if self.store.update_session(session_id, fields)? {
            Ok(())
        } else {
            Err(QueueError::NotFound(session_id.clone()))
        }
    }

    /// Expire the session in place (no reorder, no `QueueChanged`); caller
    /// runs both. Must hold the office lock.
    fn apply_expire(&self, session: &mut QueueSession, now: &str) -> Result<QueueEvent> {
        let prior = session.status;
        let reason = timeout_reason(prior);
        session.push_event(
            LifecycleAction::Expired,
            now,
            json!({ "reason": reason, "priorStatus": prior }),
        );
        let metadata = metadata_json(session)?;
        self.apply_update(
            &session.id,
            &UpdateSessionFields {
                status: Some(SessionStatus::Expired),
                position: Some(None),
                estimated_wait_minutes: Some(None),
                metadata: Some(&metadata),
                ..UpdateSessionFields::default()
            },
        )?;
        let _ = self.timers.disarm(&session.id);
        let persisted = self.load(&session.id)?;
        *session = persisted.clone();
        Ok(QueueEvent::SessionExpired {
            base: base_at(&session.office_id, now),
            session: Box::new(persisted),
            reason: reason.to_string(),
            prior_status: prior,
        })
    }

    /// The overdue guard: a session whose deadline has passed is expired in
    /// place before any other transition is considered. Returns the events
    /// to emit after the lock drops, or `None` if the session is current.
    fn guard_overdue(
        &self,
        session: &mut QueueSession,
        config: &QueueConfig,
        now: &str,
    ) -> Result<Option<Vec<QueueEvent>>> {
        if !session.is_overdue(now) {
            return Ok(None);
        }
        let expired = self.apply_expire(session, now)?;
        self.reorder(&session.office_id, config, now)?;
        Ok(Some(vec![
            expired,
            QueueEvent::QueueChanged {
                base: base_at(&session.office_id, now),
            },
        ]))
    }

    /// Recompute positions and wait estimates for the office's line and
    /// persist whatever changed in one transaction. Must hold the office
    /// lock.
    fn reorder(&self, office_id: &OfficeId, config: &QueueConfig, now: &str) -> Result<()> {
        let in_line = self.store.list_queue(office_id)?;
        let active = self
            .store
            .list_by_statuses(office_id, &[SessionStatus::Active])?;
        let current: HashMap<String, (Option<u32>, Option<u32>)> = in_line
            .iter()
            .map(|s| {
                (
                    s.id.as_str().to_string(),
                    (s.position, s.estimated_wait_minutes),
                )
            })
            .collect();

        let placements = ordering::rank(in_line, &active, config, time::hour_of(now));
        let updates: Vec<RankUpdate<'_>> = placements
            .iter()
            .filter(|p| {
                current.get(p.session_id.as_str())
                    != Some(&(Some(p.position), Some(p.estimated_wait_minutes)))
            })
            .map(|p| RankUpdate {
                session_id: p.session_id.as_str(),
                position: p.position,
                estimated_wait_minutes: p.estimated_wait_minutes,
            })
            .collect();
        let _ = self.store.apply_rankings(&updates)?;
        Ok(())
    }

    fn arm_timer(self: &Arc<Self>, session_id: &SessionId, expires_at: &str) {
        let service = Arc::clone(self);
        let id = session_id.clone();
        self.timers.schedule(session_id, expires_at, async move {
            match service.expire(&id).await {
                Ok(_) | Err(QueueError::NotFound(_)) => {}
                Err(error) => warn!(session_id = %id, %error, "timer expiry failed"),
            }
        });
    }

    fn emit_all(&self, events: Vec<QueueEvent>) {
        for event in events {
            self.emitter.emit(event);
        }
    }
}

fn base_at(office_id: &OfficeId, now: &str) -> BaseEvent {
    BaseEvent {
        office_id: office_id.clone(),
        timestamp: now.to_string(),
    }
}

fn invalid(session_id: &SessionId, from: SessionStatus, to: SessionStatus) -> QueueError {
    QueueError::InvalidTransition {
        session_id: session_id.clone(),
        from,
        to,
    }
}

fn metadata_json(session: &QueueSession) -> Result<String> {
    Ok(serde_json::to_string(&session.metadata).map_err(StoreError::from)?)
}

fn check_minutes_range(what: &str, minutes: u32) -> Result<()> {
    if (1..=MAX_EXTEND_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(QueueError::InvalidOperation(format!(
            "{what} must be between 1 and {MAX_EXTEND_MINUTES}, got {minutes}"
        )))
    }
}

fn timeout_reason(prior: SessionStatus) -> &'static str {
    match prior {
        SessionStatus::Ready => "ready timeout",
        SessionStatus::Active => "active timeout",
        _ => "session timeout",
    }
}

fn round1(minutes: f64) -> f64 {
    (minutes * 10.0).round() / 10.0
}

fn validate_config(config: &QueueConfig) -> Result<()> {
    let bad = |message: String| Err(QueueError::InvalidOperation(message));
    if config.max_concurrent_sessions == 0 {
        return bad("maxConcurrentSessions must be at least 1".to_string());
    }
    for (name, value) in [
        ("sessionTimeoutMinutes", config.session_timeout_minutes),
        ("readyTimeoutMinutes", config.ready_timeout_minutes),
        ("activeTimeoutMinutes", config.active_timeout_minutes),
        ("defaultTramiteMinutes", config.default_tramite_minutes),
    ] {
        if value == 0 {
            return bad(format!("{name} must be at least 1"));
        }
    }
    if !(0.0..=1.0).contains(&config.active_discount) {
        return bad(format!(
            "activeDiscount must be within 0.0..=1.0, got {}",
            config.active_discount
        ));
    }
    if config.peak_hour_multiplier <= 0.0 {
        return bad(format!(
            "peakHourMultiplier must be positive, got {}",
            config.peak_hour_multiplier
        ));
    }
    if let Some(hour) = config.peak_hours.iter().find(|h| **h > 23) {
        return bad(format!("peakHours entries must be 0..=23, got {hour}"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
