//! TTL cache over per-office queue configs.
//!
//! Reads go through the cache; writes go through to the store and replace
//! the cached entry in the same call. Entries older than the TTL are
//! reloaded on the next read, so an external edit to `office_configs` is
//! picked up within one TTL. The store always wins on disagreement.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use turno_core::config::QueueConfig;
use turno_core::ids::OfficeId;
use turno_store::QueueStore;

use crate::errors::Result;

struct CachedConfig {
    config: QueueConfig,
    fetched_at: Instant,
}

/// Read-through TTL cache over the `office_configs` table.
///
/// Offices with no stored row resolve to the process-wide defaults; that
/// resolution is cached too, so a busy unconfigured office costs one store
/// read per TTL, not one per operation.
pub struct ConfigCache {
    store: Arc<QueueStore>,
    defaults: QueueConfig,
    ttl: Duration,
    entries: Mutex<HashMap<OfficeId, CachedConfig>>,
}

impl ConfigCache {
    /// Create a cache over `store` with the given TTL and fallback defaults.
    #[must_use]
    pub fn new(store: Arc<QueueStore>, defaults: QueueConfig, ttl: Duration) -> Self {
        Self {
            store,
            defaults,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The office's effective config: cached if fresh, reloaded otherwise.
    pub fn get(&self, office_id: &OfficeId) -> Result<QueueConfig> {
        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(office_id) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.config.clone());
                }
            }
        }

        // Lock released during the store read; a racing reload just writes
        // the same row twice.
        let config = self
            .store
            .get_office_config(office_id)?
            .unwrap_or_else(|| self.defaults.clone());
        let _ = self.entries.lock().insert(
            office_id.clone(),
            CachedConfig {
                config: config.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(config)
    }

    /// Persist a new config for the office and refresh the cache entry.
    pub fn update(&self, office_id: &OfficeId, config: &QueueConfig) -> Result<()> {
        self.store.put_office_config(office_id, config)?;
        let _ = self.entries.lock().insert(
            office_id.clone(),
            CachedConfig {
                config: config.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Drop the office's cache entry; the next read reloads from the store.
    pub fn invalidate(&self, office_id: &OfficeId) {
        let _ = self.entries.lock().remove(office_id);
    }

    /// Number of cached offices (fresh or stale).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
