//! Session lifecycle handlers: get, markReady, activate, complete, cancel,
//! extend, setPriority, delete.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use turno_core::ids::SessionId;
use turno_core::types::Priority;
use turno_engine::service::TransitionOutcome;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::{
    opt_string_param, parse_enum, require_param, require_string_param, require_u32_param,
};
use crate::registry::MethodHandler;

fn session_id_param(params: Option<&Value>) -> Result<SessionId, RpcError> {
    Ok(SessionId::from_string(require_string_param(
        params,
        "sessionId",
    )?))
}

fn outcome_value(outcome: TransitionOutcome) -> Result<Value, RpcError> {
    let session = serde_json::to_value(outcome.session).map_err(|e| RpcError::Internal {
        message: e.to_string(),
    })?;
    Ok(json!({ "session": session, "applied": outcome.applied }))
}

/// Fetch one session.
pub struct GetSessionHandler;

#[async_trait]
impl MethodHandler for GetSessionHandler {
    #[instrument(skip(self, ctx), fields(method = "session.get"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        let session = ctx.service.get_session(&session_id).await?;
        serde_json::to_value(session).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Call the client forward (WAITING → READY).
pub struct MarkReadyHandler;

#[async_trait]
impl MethodHandler for MarkReadyHandler {
    #[instrument(skip(self, ctx), fields(method = "session.markReady", idempotency_key))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        outcome_value(ctx.service.mark_ready(&session_id).await?)
    }
}

/// Start service at a desk (WAITING | READY → ACTIVE).
pub struct ActivateHandler;

#[async_trait]
impl MethodHandler for ActivateHandler {
    #[instrument(skip(self, ctx), fields(method = "session.activate", idempotency_key))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        outcome_value(ctx.service.activate(&session_id).await?)
    }
}

/// Finish service (ACTIVE → COMPLETED), optionally merging caller metadata.
pub struct CompleteHandler;

#[async_trait]
impl MethodHandler for CompleteHandler {
    #[instrument(skip(self, ctx), fields(method = "session.complete", idempotency_key))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        let metadata = params
            .as_ref()
            .and_then(|p| p.get("metadata"))
            .filter(|v| !v.is_null())
            .cloned();
        outcome_value(ctx.service.complete(&session_id, metadata).await?)
    }
}

/// Withdraw a session (non-terminal → CANCELLED).
pub struct CancelHandler;

#[async_trait]
impl MethodHandler for CancelHandler {
    #[instrument(skip(self, ctx), fields(method = "session.cancel", idempotency_key))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        let reason = opt_string_param(params.as_ref(), "reason")?;
        outcome_value(ctx.service.cancel(&session_id, reason).await?)
    }
}

/// Push a session's expiry deadline out by `minutes`.
pub struct ExtendHandler;

#[async_trait]
impl MethodHandler for ExtendHandler {
    #[instrument(skip(self, ctx), fields(method = "session.extend", idempotency_key))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        let minutes = require_u32_param(params.as_ref(), "minutes")?;
        outcome_value(ctx.service.extend(&session_id, minutes).await?)
    }
}

/// Replace a session's priority band.
pub struct SetPriorityHandler;

#[async_trait]
impl MethodHandler for SetPriorityHandler {
    #[instrument(skip(self, ctx), fields(method = "session.setPriority", idempotency_key))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        let priority: Priority =
            parse_enum("priority", require_param(params.as_ref(), "priority")?)?;
        outcome_value(ctx.service.set_priority(&session_id, priority).await?)
    }
}

/// Administrative purge of a terminal session.
pub struct DeleteSessionHandler;

#[async_trait]
impl MethodHandler for DeleteSessionHandler {
    #[instrument(skip(self, ctx), fields(method = "session.delete"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = session_id_param(params.as_ref())?;
        ctx.service.delete_session(&session_id).await?;
        Ok(json!({ "deleted": true }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
