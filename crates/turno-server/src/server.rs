//! `TurnoServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use turno_rpc::context::RpcContext;
use turno_rpc::registry::MethodRegistry;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast manager for event fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// Shared RPC context (engine façade + shutdown token).
    pub ctx: Arc<RpcContext>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus render handle, when the recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Monotonic connection ID counter.
    next_conn_id: Arc<AtomicU64>,
}

/// The main Turno server.
pub struct TurnoServer {
    config: Arc<ServerConfig>,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl TurnoServer {
    /// Create a new server.
    ///
    /// The shutdown coordinator wraps the context's token so that a
    /// `system.shutdown` RPC and ctrl-c converge on the same signal.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        registry: MethodRegistry,
        ctx: Arc<RpcContext>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::from_token(ctx.shutdown.clone()));
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            ctx,
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = AppState {
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            registry: self.registry.clone(),
            ctx: self.ctx.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            next_conn_id: Arc::new(AtomicU64::new(1)),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and start serving in a background task.
    ///
    /// Returns the bound address (useful with port 0) and the accept-loop
    /// handle; the loop drains when the shutdown token fires.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "server listening");

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                warn!(error = %e, "server exited with error");
            }
        });
        Ok((addr, handle))
    }

    /// Get the broadcast manager.
    #[must_use]
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the method registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count().await;
    let waiting = state.ctx.service.waiting_session_count().unwrap_or(0);
    Json(health::health_check(state.start_time, connections, waiting))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// GET /ws — upgrade to the RPC WebSocket.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    if state.broadcast.connection_count().await >= state.config.max_connections {
        warn!(limit = state.config.max_connections, "connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    let client_id = format!("conn_{}", state.next_conn_id.fetch_add(1, Ordering::Relaxed));
    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);
    let max_message_size = state.config.max_message_size;

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                client_id,
                state.registry,
                state.ctx,
                state.broadcast,
                ping_interval,
                pong_timeout,
            )
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use turno_engine::service::{QueueService, ServiceOptions};
    use turno_store::QueueStore;

    fn make_ctx() -> Arc<RpcContext> {
        let pool =
            turno_store::new_in_memory(&turno_store::ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = turno_store::run_migrations(&conn).unwrap();
        }
        let store = Arc::new(QueueStore::new(pool));
        let service = Arc::new(QueueService::new(store, ServiceOptions::default()));
        Arc::new(RpcContext {
            service,
            shutdown: CancellationToken::new(),
            server_start_time: Instant::now(),
        })
    }

    fn make_server() -> TurnoServer {
        let mut registry = MethodRegistry::new();
        turno_rpc::handlers::register_all(&mut registry);
        TurnoServer::new(ServerConfig::default(), registry, make_ctx(), None)
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["waiting_sessions"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_unavailable_without_recorder() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_without_upgrade_headers_is_rejected() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // Axum rejects a plain GET on an upgrade route.
        assert_ne!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_refused_while_shutting_down() {
        let server = make_server();
        server.shutdown().shutdown();
        let app = server.router();

        let req = Request::builder()
            .uri("/ws")
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn system_shutdown_rpc_reaches_the_coordinator() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
        // The coordinator wraps the context token, so cancelling the
        // context (what the system.shutdown handler does) is visible here.
        server.ctx.shutdown.cancel();
        assert!(server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn listen_binds_an_ephemeral_port() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
        let _ = handle.await;
    }
}
