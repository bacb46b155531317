//! Prometheus metrics exposition.
//!
//! Counters and histograms are recorded throughout the RPC and WebSocket
//! layers with the `metrics` facade; this module installs the Prometheus
//! recorder and renders the scrape payload for `GET /metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Total RPC requests dispatched, labeled by method.
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// Total RPC errors, labeled by method and error type.
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// RPC handler latency histogram, labeled by method.
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
/// Total WebSocket connections accepted.
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Total WebSocket disconnections.
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Currently open WebSocket connections.
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Events dropped because a subscriber's send queue was full.
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";

/// Failure to install the global metrics recorder.
#[derive(Debug, Error)]
#[error("failed to install metrics recorder: {0}")]
pub struct MetricsError(String);

/// Install the global Prometheus recorder.
///
/// Call once at startup; the returned handle renders the scrape payload.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError(e.to_string()))
}

/// Render the current metrics in Prometheus text format.
#[must_use]
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
