//! On-demand statistics assembly.
//!
//! Builds a [`QueueStats`] snapshot from store queries. Counts are
//! table-wide; the wait/service aggregates cover sessions completed inside
//! the trailing window; distributions and the hourly histogram cover that
//! window plus the current non-terminal set, so a quiet office still shows
//! who is in the building right now.

use chrono::{Duration, Utc};

use turno_core::ids::OfficeId;
use turno_core::stats::{QueueStats, TimeAggregate};
use turno_core::time;
use turno_store::QueueStore;

use crate::errors::Result;

/// Compute a fresh stats snapshot for one office.
///
/// `now` is the canonical timestamp the caller computed for the request;
/// the window is the `window_hours` before it.
pub fn compute(
    store: &QueueStore,
    office_id: &OfficeId,
    window_hours: u32,
    now: &str,
) -> Result<QueueStats> {
    let now_dt = time::parse_rfc3339(now).unwrap_or_else(Utc::now);
    let since = time::to_rfc3339(now_dt - Duration::hours(i64::from(window_hours)));

    let counts = store.status_counts(office_id)?;
    let completed = store.list_completed_since(office_id, &since)?;
    let current = store.list_non_terminal(Some(office_id))?;

    // Wait = creation to call, service = call to completion. A completed
    // session always has called_at, but a corrupt row without one is simply
    // left out of the aggregate.
    let wait_samples: Vec<f64> = completed
        .iter()
        .filter_map(|s| {
            let called_at = s.called_at.as_deref()?;
            time::minutes_between(&s.created_at, called_at)
        })
        .filter(|m| *m >= 0.0)
        .collect();
    let service_samples: Vec<f64> = completed
        .iter()
        .filter_map(|s| {
            let called_at = s.called_at.as_deref()?;
            let completed_at = s.completed_at.as_deref()?;
            time::minutes_between(called_at, completed_at)
        })
        .filter(|m| *m >= 0.0)
        .collect();

    let mut tramite_distribution = std::collections::BTreeMap::new();
    let mut priority_distribution = std::collections::BTreeMap::new();
    let mut hourly_histogram = [0u32; 24];
    for session in completed.iter().chain(current.iter()) {
        *tramite_distribution.entry(session.tramite_type).or_insert(0) += 1;
        *priority_distribution.entry(session.priority).or_insert(0) += 1;
        if let Some(hour) = time::hour_of(&session.created_at) {
            hourly_histogram[usize::from(hour) % 24] += 1;
        }
    }

    Ok(QueueStats {
        office_id: office_id.clone(),
        generated_at: now.to_string(),
        window_hours,
        waiting_count: counts.waiting,
        active_count: counts.active,
        counts,
        wait_time: TimeAggregate::from_samples(&wait_samples),
        service_time: TimeAggregate::from_samples(&service_samples),
        tramite_distribution,
        priority_distribution,
        peak_hours: peak_hours(&hourly_histogram),
        hourly_histogram,
    })
}

/// Hours whose arrival count reaches at least 80% of the busiest hour.
#[must_use]
pub fn peak_hours(histogram: &[u32; 24]) -> Vec<u8> {
    let max = histogram.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return Vec::new();
    }
    let threshold = f64::from(max) * 0.8;
    histogram
        .iter()
        .enumerate()
        .filter(|(_, count)| f64::from(**count) >= threshold)
        .filter_map(|(hour, _)| u8::try_from(hour).ok())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
