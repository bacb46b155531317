//! System handlers: ping, getInfo, shutdown.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::registry::MethodHandler;

/// Returns a pong with the current server timestamp.
pub struct PingHandler;

#[async_trait]
impl MethodHandler for PingHandler {
    #[instrument(skip(self, _ctx), fields(method = "system.ping"))]
    async fn handle(&self, _params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(serde_json::json!({
            "pong": true,
            "timestamp": turno_core::time::now_rfc3339(),
        }))
    }
}

/// Returns server version, platform, and queue occupancy.
pub struct GetInfoHandler;

#[async_trait]
impl MethodHandler for GetInfoHandler {
    #[instrument(skip(self, ctx), fields(method = "system.getInfo"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let uptime = ctx.server_start_time.elapsed().as_secs();
        let waiting = ctx.service.waiting_session_count()?;

        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptimeSecs": uptime,
            "waitingSessions": waiting,
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "runtime": "turno",
        }))
    }
}

/// Triggers a graceful shutdown of the server.
pub struct ShutdownHandler;

#[async_trait]
impl MethodHandler for ShutdownHandler {
    #[instrument(skip(self, ctx), fields(method = "system.shutdown"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        ctx.shutdown.cancel();
        Ok(serde_json::json!({ "acknowledged": true }))
    }
}
