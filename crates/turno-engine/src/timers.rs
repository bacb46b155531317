//! One-shot expiry timers keyed by session.
//!
//! Every non-terminal session has exactly one pending timer. [`schedule`]
//! replaces any previous timer for the session; [`disarm`] is the single code
//! path that cancels one. Each timer carries a generation number: on wakeup it
//! may act only if it is still the session's current timer, so a timer whose
//! abort raced its own wakeup (extend, re-arm) is a guaranteed no-op.
//!
//! Firing removes the registry entry and then runs the provided future; the
//! service routes that future through the normal expiry path, which re-checks
//! status under the office lock.
//!
//! [`schedule`]: TimerService::schedule
//! [`disarm`]: TimerService::disarm

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use turno_core::ids::SessionId;
use turno_core::time;

struct TimerEntry {
    generation: u64,
    deadline: String,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct TimerInner {
    timers: DashMap<SessionId, TimerEntry>,
    seq: AtomicU64,
}

/// Registry of pending one-shot expiry timers.
pub struct TimerService {
    inner: Arc<TimerInner>,
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TimerInner::default()),
        }
    }

    /// Arm (or re-arm) the session's timer to fire at `expires_at`.
    ///
    /// A past or unparseable deadline fires immediately; the expiry path's
    /// own status re-check decides what actually happens.
    pub fn schedule<F>(&self, session_id: &SessionId, expires_at: &str, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = delay_until(expires_at);

        // Claim the slot before spawning so the previous timer can no longer
        // pass its generation check, even if its abort comes too late.
        let previous = self.inner.timers.insert(
            session_id.clone(),
            TimerEntry {
                generation,
                deadline: expires_at.to_string(),
                handle: None,
            },
        );
        if let Some(TimerEntry {
            handle: Some(handle),
            ..
        }) = previous
        {
            handle.abort();
        }

        let inner = Arc::clone(&self.inner);
        let id = session_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = inner
                .timers
                .remove_if(&id, |_, entry| entry.generation == generation)
                .is_some();
            if current {
                on_fire.await;
            } else {
                debug!(session_id = id.as_str(), "stale timer wakeup ignored");
            }
        });

        if let Some(mut entry) = self.inner.timers.get_mut(session_id) {
            if entry.generation == generation {
                entry.handle = Some(handle);
            }
        }
    }

    /// Cancel the session's pending timer. Returns whether one was armed.
    pub fn disarm(&self, session_id: &SessionId) -> bool {
        match self.inner.timers.remove(session_id) {
            Some((_, entry)) => {
                if let Some(handle) = entry.handle {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer (shutdown).
    pub fn cancel_all(&self) {
        for entry in self.inner.timers.iter() {
            if let Some(handle) = &entry.handle {
                handle.abort();
            }
        }
        self.inner.timers.clear();
    }

    /// Number of pending timers.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.inner.timers.len()
    }

    /// The deadline the session's timer is armed for, if any.
    #[must_use]
    pub fn deadline(&self, session_id: &SessionId) -> Option<String> {
        self.inner
            .timers
            .get(session_id)
            .map(|entry| entry.deadline.clone())
    }
}

fn delay_until(expires_at: &str) -> Duration {
    match time::parse_rfc3339(expires_at) {
        Some(deadline) => (deadline - chrono::Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO),
        None => {
            warn!(expires_at, "unparseable deadline, firing immediately");
            Duration::ZERO
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
