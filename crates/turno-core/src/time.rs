//! Timestamp helpers with a fixed-width RFC 3339 format.
//!
//! All timestamps in the engine are UTC strings like
//! `2026-08-24T10:15:00.000Z`: millisecond precision, `Z` suffix, no offset
//! variants. Fixed width means lexicographic comparison equals chronological
//! comparison, which the store relies on for `expires_at <= now` scans.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a `DateTime` in the engine's canonical fixed-width form.
#[must_use]
pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current UTC time in the canonical fixed-width form.
#[must_use]
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Parse a canonical timestamp back into a `DateTime<Utc>`.
///
/// Returns `None` for anything that is not valid RFC 3339. Callers treat an
/// unparseable stored timestamp as corrupt data, not a panic.
#[must_use]
pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `base` plus `minutes`, formatted canonically.
#[must_use]
pub fn plus_minutes(base: DateTime<Utc>, minutes: u32) -> String {
    to_rfc3339(base + Duration::minutes(i64::from(minutes)))
}

/// Fractional minutes elapsed from `start` to `end`.
///
/// Negative if `end` precedes `start`; `None` if either side fails to parse.
#[must_use]
pub fn minutes_between(start: &str, end: &str) -> Option<f64> {
    let start = parse_rfc3339(start)?;
    let end = parse_rfc3339(end)?;
    let millis = end.signed_duration_since(start).num_milliseconds();
    #[allow(clippy::cast_precision_loss)]
    Some(millis as f64 / 60_000.0)
}

/// UTC hour of day (0-23) of a canonical timestamp.
#[must_use]
pub fn hour_of(s: &str) -> Option<u8> {
    use chrono::Timelike;
    let dt = parse_rfc3339(s)?;
    u8::try_from(dt.hour()).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_format_is_fixed_width() {
        let ts = now_rfc3339();
        // 2026-08-24T10:15:00.000Z
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn lexicographic_order_matches_chronological() {
        let early = parse_rfc3339("2026-08-24T09:59:59.999Z").unwrap();
        let late = early + Duration::milliseconds(1);
        assert!(to_rfc3339(early) < to_rfc3339(late));
    }

    #[test]
    fn round_trip_preserves_instant() {
        let ts = "2026-08-24T10:15:00.250Z";
        let parsed = parse_rfc3339(ts).unwrap();
        assert_eq!(to_rfc3339(parsed), ts);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_rfc3339("not a timestamp").is_none());
        assert!(parse_rfc3339("").is_none());
    }

    #[test]
    fn plus_minutes_advances() {
        let base = parse_rfc3339("2026-08-24T10:00:00.000Z").unwrap();
        assert_eq!(plus_minutes(base, 15), "2026-08-24T10:15:00.000Z");
    }

    #[test]
    fn minutes_between_fractional() {
        let from = "2026-08-24T10:00:00.000Z";
        let to = "2026-08-24T10:07:30.000Z";
        let delta = minutes_between(from, to).unwrap();
        assert!((delta - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn minutes_between_negative_when_reversed() {
        let from = "2026-08-24T10:07:30.000Z";
        let to = "2026-08-24T10:00:00.000Z";
        assert!(minutes_between(from, to).unwrap() < 0.0);
    }

    #[test]
    fn hour_of_extracts_utc_hour() {
        assert_eq!(hour_of("2026-08-24T16:45:00.000Z"), Some(16));
        assert_eq!(hour_of("bogus"), None);
    }
}
