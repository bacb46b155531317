//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON wire
//! format. Each type implements [`Default`] with production default values.
//! Types marked with `#[serde(default)]` allow partial JSON — missing fields
//! get their default value during deserialization.

use serde::{Deserialize, Serialize};

use turno_core::config::QueueConfig;

/// Root settings type for the Turno daemon.
///
/// Loaded from `~/.turno/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// All field names are camelCase. Example:
///
/// ```json
/// {
///   "version": "0.1.0",
///   "server": { "port": 9090 },
///   "engine": { "sweepIntervalSecs": 30 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnoSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Server network settings.
    pub server: ServerSettings,
    /// Queue engine settings.
    pub engine: EngineSettings,
}

impl Default for TurnoSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "turno".to_string(),
            server: ServerSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

/// Server network settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port for HTTP and WebSocket.
    pub port: u16,
    /// Maximum simultaneous WebSocket connections.
    pub max_connections: usize,
    /// Ping cadence for connection liveness.
    pub heartbeat_interval_ms: u64,
    /// Drop a connection after this long without a pong.
    pub heartbeat_timeout_ms: u64,
    /// Path to the `SQLite` database file.
    pub db_path: String,
    /// Minimum log level (overridden by `RUST_LOG`).
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 256,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 60_000,
            db_path: "turno.db".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Queue engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Cadence of the periodic expiry sweep.
    pub sweep_interval_secs: u64,
    /// Per-office floor between `queue-updated` broadcasts.
    pub queue_update_throttle_ms: u64,
    /// Cadence of `stats-updated` broadcasts for dirty offices.
    pub stats_broadcast_interval_secs: u64,
    /// How long a cached office config stays fresh.
    pub config_cache_ttl_secs: u64,
    /// Trailing window for stats aggregates.
    pub stats_window_hours: u32,
    /// Office config used when an office has no stored row.
    pub defaults: QueueConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            queue_update_throttle_ms: 1000,
            stats_broadcast_interval_secs: 5,
            config_cache_ttl_secs: 60,
            stats_window_hours: 24,
            defaults: QueueConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
