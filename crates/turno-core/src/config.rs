//! Per-office queue configuration.
//!
//! One [`QueueConfig`] row per office, stored as JSON in `office_configs` and
//! read through a TTL cache. Offices that never configured anything get
//! [`QueueConfig::default()`], so every knob has a sane default here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::TramiteType;

/// Capacity, timeout, and estimation knobs for one office's queue.
///
/// Estimation coefficients (`active_discount`, `peak_hour_multiplier`) live
/// here rather than as constants so each office can document and tune its own
/// values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// How many sessions may be ACTIVE at once. Admission control for
    /// `activate`.
    pub max_concurrent_sessions: u32,
    /// WAITING budget: minutes from creation until expiry.
    pub session_timeout_minutes: u32,
    /// READY budget: minutes from `mark_ready` until expiry.
    pub ready_timeout_minutes: u32,
    /// ACTIVE budget: minutes from `activate` until expiry.
    pub active_timeout_minutes: u32,
    /// Per-tramite service time estimates in minutes. Missing entries fall
    /// back to [`Self::default_tramite_minutes`].
    pub estimated_time_per_tramite: BTreeMap<TramiteType, u32>,
    /// Fallback service time estimate.
    pub default_tramite_minutes: u32,
    /// Fraction of its estimate an ACTIVE session still contributes to wait
    /// estimates (it is assumed partway through service).
    pub active_discount: f64,
    /// UTC hours considered peak for this office.
    pub peak_hours: Vec<u8>,
    /// Wait estimate multiplier applied during peak hours.
    pub peak_hour_multiplier: f64,
    /// When false, ordering ignores priority bands (pure FIFO).
    pub priority_enabled: bool,
    /// When false, office-topic broadcasts are suppressed for this office.
    pub notifications_enabled: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 3,
            session_timeout_minutes: 120,
            ready_timeout_minutes: 15,
            active_timeout_minutes: 60,
            estimated_time_per_tramite: BTreeMap::new(),
            default_tramite_minutes: 20,
            active_discount: 0.5,
            peak_hours: vec![9, 10, 11, 16, 17],
            peak_hour_multiplier: 1.25,
            priority_enabled: true,
            notifications_enabled: true,
        }
    }
}

impl QueueConfig {
    /// Service time estimate for a tramite type, falling back to the default.
    #[must_use]
    pub fn tramite_minutes(&self, tramite: TramiteType) -> u32 {
        self.estimated_time_per_tramite
            .get(&tramite)
            .copied()
            .unwrap_or(self.default_tramite_minutes)
    }

    /// Whether the given UTC hour is a configured peak hour.
    #[must_use]
    pub fn is_peak_hour(&self, hour: u8) -> bool {
        self.peak_hours.contains(&hour)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
