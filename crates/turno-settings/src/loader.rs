//! Settings loading with layered sources and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TurnoSettings::default()`]
//! 2. If `~/.turno/settings.json` exists, merge user values over defaults
//!    (nested objects merge per-key via `figment`)
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate ranges that would break the engine at runtime
//!
//! Env var parsing is strict: out-of-range or malformed values are logged and
//! ignored rather than partially applied.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Serialized};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::TurnoSettings;

/// Resolve the path to the settings file (`~/.turno/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".turno").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TurnoSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TurnoSettings> {
    let mut figment = Figment::from(Serialized::defaults(TurnoSettings::default()));

    if path.exists() {
        debug!(?path, "loading settings from file");
        figment = figment.merge(Json::file(path));
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let mut settings: TurnoSettings = figment.extract()?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are logged and ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut TurnoSettings) {
    if let Some(v) = read_env_u16("TURNO_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("TURNO_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_string("TURNO_DB_PATH") {
        settings.server.db_path = v;
    }
    if let Some(v) = read_env_usize("TURNO_MAX_CONNECTIONS", 1, 10_000) {
        settings.server.max_connections = v;
    }
    if let Some(v) = read_env_u64("TURNO_HEARTBEAT_INTERVAL", 1000, 600_000) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_string("TURNO_LOG_LEVEL") {
        settings.server.log_level = v;
    }
    if let Some(v) = read_env_u64("TURNO_SWEEP_INTERVAL", 1, 86_400) {
        settings.engine.sweep_interval_secs = v;
    }
    if let Some(v) = read_env_u64("TURNO_STATS_INTERVAL", 1, 3_600) {
        settings.engine.stats_broadcast_interval_secs = v;
    }
    if let Some(v) = read_env_bool("TURNO_PRIORITY_ENABLED") {
        settings.engine.defaults.priority_enabled = v;
    }
}

/// Reject values that would break the engine at runtime.
fn validate(settings: &TurnoSettings) -> Result<()> {
    if settings.server.heartbeat_timeout_ms <= settings.server.heartbeat_interval_ms {
        return Err(SettingsError::InvalidValue(format!(
            "heartbeatTimeoutMs ({}) must exceed heartbeatIntervalMs ({})",
            settings.server.heartbeat_timeout_ms, settings.server.heartbeat_interval_ms
        )));
    }
    if settings.engine.queue_update_throttle_ms < 100 {
        return Err(SettingsError::InvalidValue(format!(
            "queueUpdateThrottleMs ({}) must be at least 100",
            settings.engine.queue_update_throttle_ms
        )));
    }
    if let Some(hour) = settings
        .engine
        .defaults
        .peak_hours
        .iter()
        .find(|h| **h > 23)
    {
        return Err(SettingsError::InvalidValue(format!(
            "peakHours entry {hour} is not a valid hour (0-23)"
        )));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // ── parse_bool ──────────────────────────────────────────────────

    #[test]
    fn parse_bool_truthy_values() {
        for val in ["true", "TRUE", "1", "yes", "on", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for: {val}");
        }
    }

    #[test]
    fn parse_bool_falsy_values() {
        for val in ["false", "FALSE", "0", "no", "off", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for: {val}");
        }
    }

    #[test]
    fn parse_bool_rejects_garbage() {
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
        assert_eq!(parse_bool("2"), None);
    }

    // ── range parsers ───────────────────────────────────────────────

    #[test]
    fn parse_u16_range_accepts_in_range() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("1", 1, 65535), Some(1));
        assert_eq!(parse_u16_range("65535", 1, 65535), Some(65535));
    }

    #[test]
    fn parse_u16_range_rejects_out_of_range() {
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u16_range("-1", 1, 65535), None);
        assert_eq!(parse_u16_range("abc", 1, 65535), None);
    }

    #[test]
    fn parse_u64_range_bounds_inclusive() {
        assert_eq!(parse_u64_range("1", 1, 86_400), Some(1));
        assert_eq!(parse_u64_range("86400", 1, 86_400), Some(86_400));
        assert_eq!(parse_u64_range("0", 1, 86_400), None);
        assert_eq!(parse_u64_range("86401", 1, 86_400), None);
    }

    #[test]
    fn parse_usize_range_rejects_garbage() {
        assert_eq!(parse_usize_range("12.5", 1, 100), None);
        assert_eq!(parse_usize_range("", 1, 100), None);
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings, TurnoSettings::default());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "server": {{ "port": 9090 }}, "engine": {{ "statsWindowHours": 12 }} }}"#
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.engine.stats_window_hours, 12);
        // Untouched keys keep their defaults.
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.engine.sweep_interval_secs, 60);
    }

    #[test]
    fn nested_queue_defaults_merge_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "engine": {{ "defaults": {{ "maxConcurrentSessions": 6 }} }} }}"#
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.engine.defaults.max_concurrent_sessions, 6);
        assert_eq!(settings.engine.defaults.session_timeout_minutes, 120);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{{ not json").unwrap();

        assert!(load_settings_from_path(&path).is_err());
    }

    // ── validation ──────────────────────────────────────────────────

    #[test]
    fn validate_rejects_heartbeat_timeout_below_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "server": {{ "heartbeatIntervalMs": 60000, "heartbeatTimeoutMs": 30000 }} }}"#
        )
        .unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
        assert!(err.to_string().contains("heartbeatTimeoutMs"));
    }

    #[test]
    fn validate_rejects_bad_peak_hour() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "engine": {{ "defaults": {{ "peakHours": [9, 25] }} }} }}"#
        )
        .unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("25"));
    }

    #[test]
    fn validate_rejects_sub_100ms_throttle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{ "engine": {{ "queueUpdateThrottleMs": 10 }} }}"#).unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("queueUpdateThrottleMs"));
    }
}
