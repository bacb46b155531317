//! Per-office critical sections.
//!
//! Sessions in different offices never interact, so the engine serializes
//! mutations per office and nothing wider. Guard evaluation, the store write,
//! and the reorder all happen under the office's lock; broadcasts happen
//! after release.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use turno_core::ids::OfficeId;

/// One async mutex per office, created on first use.
#[derive(Default)]
pub struct OfficeLocks {
    locks: DashMap<OfficeId, Arc<Mutex<()>>>,
}

impl OfficeLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the office's lock, waiting if another mutation holds it.
    pub async fn acquire(&self, office_id: &OfficeId) -> OwnedMutexGuard<()> {
        // Clone the Arc out before awaiting so the map shard is not held
        // across the await point.
        let lock = self
            .locks
            .entry(office_id.clone())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Number of offices that have taken a lock at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no office has ever locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
