//! Queue ordering and wait estimation.
//!
//! One total order over the line: priority weight descending, then
//! `created_at` ascending, then `id` ascending. IDs are UUID v7 strings, so
//! the final tie-break is itself creation-ordered and the order is fully
//! deterministic. With `priority_enabled = false` the priority key drops out
//! and the queue is pure FIFO.
//!
//! [`rank`] is the only place the wait formula lives:
//!
//! ```text
//! estimate(p) = (sum of tramite minutes ranked ahead of p
//!                + sum of ACTIVE tramite minutes x active_discount)
//!               x peak_hour_multiplier   (iff the hour is a peak hour)
//! ```
//!
//! rounded to the nearest whole minute. The peak adjustment is always applied
//! last.

use std::cmp::Ordering;

use turno_core::config::QueueConfig;
use turno_core::ids::SessionId;
use turno_core::session::QueueSession;

/// Compare two sessions under the queue's total order.
#[must_use]
pub fn queue_cmp(a: &QueueSession, b: &QueueSession, priority_enabled: bool) -> Ordering {
    if priority_enabled {
        match b.priority.weight().cmp(&a.priority.weight()) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    match a.created_at.cmp(&b.created_at) {
        Ordering::Equal => a.id.as_str().cmp(b.id.as_str()),
        other => other,
    }
}

/// Sort sessions in place under the queue's total order.
pub fn sort_queue(sessions: &mut [QueueSession], priority_enabled: bool) {
    sessions.sort_by(|a, b| queue_cmp(a, b, priority_enabled));
}

/// One computed rank: where a session stands and how long it should wait.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    /// The ranked session.
    pub session_id: SessionId,
    /// Dense 1-based position in the line.
    pub position: u32,
    /// Advisory wait estimate in whole minutes.
    pub estimated_wait_minutes: u32,
}

/// Rank an office's line and compute wait estimates.
///
/// `in_line` is the WAITING and READY set (any input order), `active` the
/// ACTIVE set, `hour` the current UTC hour (`None` disables the peak
/// adjustment). Returns one [`Placement`] per in-line session, in rank order.
#[must_use]
pub fn rank(
    mut in_line: Vec<QueueSession>,
    active: &[QueueSession],
    config: &QueueConfig,
    hour: Option<u8>,
) -> Vec<Placement> {
    sort_queue(&mut in_line, config.priority_enabled);

    let active_load: f64 = active
        .iter()
        .map(|s| f64::from(config.tramite_minutes(s.tramite_type)))
        .sum::<f64>()
        * config.active_discount;
    let peak = hour.is_some_and(|h| config.is_peak_hour(h));

    let mut ahead = 0.0f64;
    let mut placements = Vec::with_capacity(in_line.len());
    for (index, session) in in_line.iter().enumerate() {
        let mut estimate = ahead + active_load;
        if peak {
            estimate *= config.peak_hour_multiplier;
        }
        placements.push(Placement {
            session_id: session.id.clone(),
            position: u32::try_from(index + 1).unwrap_or(u32::MAX),
            estimated_wait_minutes: round_minutes(estimate),
        });
        ahead += f64::from(config.tramite_minutes(session.tramite_type));
    }
    placements
}

/// Round a fractional estimate to the nearest whole minute, clamped to u32.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_minutes(estimate: f64) -> u32 {
    let rounded = estimate.round();
    if rounded <= 0.0 {
        0
    } else if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
