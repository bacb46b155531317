//! Queue statistics snapshot types.
//!
//! A [`QueueStats`] is computed on demand from the store and broadcast on a
//! slow cadence. It is advisory: nothing in the engine reads it back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::OfficeId;
use crate::types::{Priority, SessionStatus, TramiteType};

/// Session counts by status.
///
/// Non-terminal counts reflect the current queue; terminal counts are
/// table-wide totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusCounts {
    /// Sessions currently WAITING.
    pub waiting: u32,
    /// Sessions currently READY.
    pub ready: u32,
    /// Sessions currently ACTIVE.
    pub active: u32,
    /// Sessions ever COMPLETED.
    pub completed: u32,
    /// Sessions ever EXPIRED.
    pub expired: u32,
    /// Sessions ever CANCELLED.
    pub cancelled: u32,
}

impl StatusCounts {
    /// Mutable slot for one status, for building counts incrementally.
    pub fn slot(&mut self, status: SessionStatus) -> &mut u32 {
        match status {
            SessionStatus::Waiting => &mut self.waiting,
            SessionStatus::Ready => &mut self.ready,
            SessionStatus::Active => &mut self.active,
            SessionStatus::Completed => &mut self.completed,
            SessionStatus::Expired => &mut self.expired,
            SessionStatus::Cancelled => &mut self.cancelled,
        }
    }

    /// Sessions occupying a place in line (WAITING + READY).
    #[must_use]
    pub fn in_line(&self) -> u32 {
        self.waiting + self.ready
    }

    /// All sessions counted.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.waiting + self.ready + self.active + self.completed + self.expired + self.cancelled
    }
}

/// Avg/min/max aggregate over a set of durations in minutes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeAggregate {
    /// Mean, rounded to one decimal.
    pub avg_minutes: f64,
    /// Smallest sample, rounded to one decimal.
    pub min_minutes: f64,
    /// Largest sample, rounded to one decimal.
    pub max_minutes: f64,
    /// Number of samples aggregated. Zero means the other fields are zero.
    pub samples: u32,
}

impl TimeAggregate {
    /// Aggregate a slice of durations. Empty input yields the zero aggregate.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let sum: f64 = samples.iter().sum();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let avg = sum / samples.len() as f64;
        Self {
            avg_minutes: round1(avg),
            min_minutes: round1(min),
            max_minutes: round1(max),
            samples: u32::try_from(samples.len()).unwrap_or(u32::MAX),
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Per-office statistics snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Office the snapshot describes.
    pub office_id: OfficeId,
    /// When the snapshot was computed.
    pub generated_at: String,
    /// Trailing window (hours) the completed-session aggregates cover.
    pub window_hours: u32,
    /// Counts by status.
    pub counts: StatusCounts,
    /// Convenience duplicate of `counts.waiting` for flat consumers.
    pub waiting_count: u32,
    /// Convenience duplicate of `counts.active` for flat consumers.
    pub active_count: u32,
    /// Wait time (creation to call) over sessions completed in the window.
    pub wait_time: TimeAggregate,
    /// Service time (call to completion) over sessions completed in the window.
    pub service_time: TimeAggregate,
    /// Sessions per tramite type over the window plus the current queue.
    pub tramite_distribution: BTreeMap<TramiteType, u32>,
    /// Sessions per priority band over the window plus the current queue.
    pub priority_distribution: BTreeMap<Priority, u32>,
    /// Arrivals by UTC hour of day over the window plus the current queue.
    pub hourly_histogram: [u32; 24],
    /// Hours whose arrivals reach at least 80% of the busiest hour.
    pub peak_hours: Vec<u8>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
