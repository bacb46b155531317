//! # turno-daemon
//!
//! Turno queue daemon binary — wires together all crates and starts the
//! HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use turno_engine::service::{QueueService, ServiceOptions};
use turno_engine::sweep::spawn_sweep;
use turno_rpc::context::RpcContext;
use turno_rpc::registry::MethodRegistry;
use turno_server::config::ServerConfig;
use turno_server::server::TurnoServer;
use turno_server::websocket::event_bridge::{BridgeConfig, EventBridge};
use turno_settings::TurnoSettings;
use turno_store::QueueStore;

/// Turno queue daemon.
#[derive(Parser, Debug)]
#[command(name = "turno-daemon", about = "Turno session queue daemon")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to the settings file (default `~/.turno/settings.json`).
    #[arg(long)]
    settings_path: Option<PathBuf>,
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Merge CLI overrides on top of loaded settings.
fn effective_settings(cli: &Cli, mut settings: TurnoSettings) -> TurnoSettings {
    if let Some(ref host) = cli.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(ref db_path) = cli.db_path {
        settings.server.db_path = db_path.to_string_lossy().into_owned();
    }
    settings
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first: the log level lives there.
    let settings_path = args
        .settings_path
        .clone()
        .unwrap_or_else(turno_settings::settings_path);
    let settings = turno_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    let settings = effective_settings(&args, settings);

    turno_core::logging::init_subscriber(&settings.server.log_level);

    // Database.
    let db_path = PathBuf::from(&settings.server.db_path);
    ensure_parent_dir(&db_path)?;
    let pool = turno_store::new_file(
        &db_path.to_string_lossy(),
        &turno_store::ConnectionConfig::default(),
    )
    .context("Failed to open database")?;
    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let _ = turno_store::run_migrations(&conn).context("Failed to run migrations")?;
    }
    let store = Arc::new(QueueStore::new(pool));

    // Engine.
    let service = Arc::new(QueueService::new(
        store,
        ServiceOptions {
            defaults: settings.engine.defaults.clone(),
            config_cache_ttl: Duration::from_secs(settings.engine.config_cache_ttl_secs),
            stats_window_hours: settings.engine.stats_window_hours,
        },
    ));

    // Restart recovery: persisted non-terminal sessions get their expiry
    // timers back before the server accepts any traffic.
    let rearmed = service
        .rearm_timers()
        .context("Failed to re-arm expiry timers")?;
    if rearmed > 0 {
        tracing::info!(rearmed, "re-armed expiry timers for persisted sessions");
    }

    // Metrics recorder; the daemon still runs if installation fails.
    let metrics_handle = match turno_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    // RPC surface.
    let mut registry = MethodRegistry::new();
    turno_rpc::handlers::register_all(&mut registry);
    let method_count = registry.methods().len();

    let cancel = CancellationToken::new();
    let ctx = Arc::new(RpcContext {
        service: service.clone(),
        shutdown: cancel.clone(),
        server_start_time: std::time::Instant::now(),
    });

    // Server.
    let config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        max_connections: settings.server.max_connections,
        heartbeat_interval_secs: (settings.server.heartbeat_interval_ms / 1000).max(1),
        heartbeat_timeout_secs: (settings.server.heartbeat_timeout_ms / 1000).max(1),
        ..ServerConfig::default()
    };
    let server = TurnoServer::new(config, registry, ctx, metrics_handle);

    // Event bridge: engine events → WebSocket topics.
    let bridge = EventBridge::new(
        service.subscribe(),
        server.broadcast().clone(),
        service.clone(),
        BridgeConfig {
            queue_update_throttle: Duration::from_millis(settings.engine.queue_update_throttle_ms),
            stats_interval: Duration::from_secs(settings.engine.stats_broadcast_interval_secs),
        },
    );
    let bridge_handle = tokio::spawn(bridge.run(cancel.clone()));

    // Periodic expiry sweep — the safety net behind per-session timers.
    let sweep_handle = spawn_sweep(
        service.clone(),
        Duration::from_secs(settings.engine.sweep_interval_secs),
        cancel.clone(),
    );

    let (addr, server_handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("turno-daemon listening on http://{addr} ({method_count} RPC methods registered)");

    // Run until ctrl-c or a system.shutdown RPC cancels the shared token.
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            tracing::info!("ctrl-c received");
        }
        () = cancel.cancelled() => {
            tracing::info!("shutdown requested over RPC");
        }
    }

    tracing::info!("shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![server_handle, bridge_handle, sweep_handle], None)
        .await;
    service.shutdown();

    tracing::info!("shutdown complete");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_settings() {
        let cli = Cli::parse_from(["turno-daemon"]);
        assert_eq!(cli.host, None);
        assert_eq!(cli.port, None);
        assert_eq!(cli.db_path, None);
        assert_eq!(cli.settings_path, None);
    }

    #[test]
    fn cli_custom_host_and_port() {
        let cli = Cli::parse_from(["turno-daemon", "--host", "0.0.0.0", "--port", "8080"]);
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn cli_db_path() {
        let cli = Cli::parse_from(["turno-daemon", "--db-path", "/tmp/turno.db"]);
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/turno.db")));
    }

    #[test]
    fn cli_settings_path() {
        let cli = Cli::parse_from(["turno-daemon", "--settings-path", "/tmp/settings.json"]);
        assert_eq!(cli.settings_path, Some(PathBuf::from("/tmp/settings.json")));
    }

    #[test]
    fn cli_overrides_win_over_settings() {
        let cli = Cli::parse_from([
            "turno-daemon",
            "--host",
            "10.0.0.1",
            "--port",
            "7000",
            "--db-path",
            "/tmp/override.db",
        ]);
        let merged = effective_settings(&cli, TurnoSettings::default());
        assert_eq!(merged.server.host, "10.0.0.1");
        assert_eq!(merged.server.port, 7000);
        assert_eq!(merged.server.db_path, "/tmp/override.db");
    }

    #[test]
    fn settings_pass_through_without_cli_overrides() {
        let cli = Cli::parse_from(["turno-daemon"]);
        let defaults = TurnoSettings::default();
        let expected_port = defaults.server.port;
        let merged = effective_settings(&cli, defaults);
        assert_eq!(merged.server.port, expected_port);
    }

    #[test]
    fn ensure_parent_dir_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("turno.db");
        ensure_parent_dir(&nested).unwrap();
        assert!(nested.parent().unwrap().is_dir());
    }
}
