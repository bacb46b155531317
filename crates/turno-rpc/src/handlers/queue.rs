//! Queue handlers: join, get, getPosition, getStats, sweepExpired.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use turno_core::ids::{OfficeId, SessionId};
use turno_core::types::{Priority, SessionStatus, TramiteType};
use turno_engine::service::{JoinRequest, QueueSort};

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::{
    opt_string_param, opt_u32_param, parse_enum, require_param, require_string_param,
};
use crate::registry::MethodHandler;

fn to_value(value: impl serde::Serialize) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal {
        message: e.to_string(),
    })
}

/// Admit a client to an office queue.
pub struct JoinQueueHandler;

#[async_trait]
impl MethodHandler for JoinQueueHandler {
    #[instrument(skip(self, ctx), fields(method = "queue.join", idempotency_key))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let params = params.as_ref();
        let office_id = OfficeId::from_string(require_string_param(params, "officeId")?);
        let client_name = require_string_param(params, "clientName")?;
        let tramite_type: TramiteType =
            parse_enum("tramiteType", require_param(params, "tramiteType")?)?;
        let priority = match params.and_then(|p| p.get("priority")) {
            None | Some(Value::Null) => Priority::Normal,
            Some(value) => parse_enum("priority", value)?,
        };
        let timeout_override_minutes = opt_u32_param(params, "timeoutOverrideMinutes")?;
        let metadata = params
            .and_then(|p| p.get("metadata"))
            .filter(|v| !v.is_null())
            .cloned();

        let session = ctx
            .service
            .join_queue(JoinRequest {
                office_id,
                client_name,
                tramite_type,
                priority,
                timeout_override_minutes,
                metadata,
            })
            .await?;
        to_value(session)
    }
}

/// List an office's queue, optionally filtered and re-sorted.
pub struct GetQueueHandler;

#[async_trait]
impl MethodHandler for GetQueueHandler {
    #[instrument(skip(self, ctx), fields(method = "queue.get"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let params = params.as_ref();
        let office_id = OfficeId::from_string(require_string_param(params, "officeId")?);
        let statuses: Option<Vec<SessionStatus>> = match params.and_then(|p| p.get("status")) {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_enum("status", value)?),
        };
        let sort = match params.and_then(|p| p.get("sort")) {
            None | Some(Value::Null) => QueueSort::default(),
            Some(value) => parse_enum("sort", value)?,
        };

        let sessions = ctx
            .service
            .get_queue(&office_id, statuses.as_deref(), sort)
            .await?;
        Ok(json!({ "officeId": office_id, "sessions": to_value(sessions)? }))
    }
}

/// Read a session's persisted place in line.
pub struct GetPositionHandler;

#[async_trait]
impl MethodHandler for GetPositionHandler {
    #[instrument(skip(self, ctx), fields(method = "queue.getPosition"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id =
            SessionId::from_string(require_string_param(params.as_ref(), "sessionId")?);
        let position = ctx.service.get_position(&session_id).await?;
        Ok(json!({ "sessionId": session_id, "position": position }))
    }
}

/// Compute a stats snapshot for an office.
pub struct GetStatsHandler;

#[async_trait]
impl MethodHandler for GetStatsHandler {
    #[instrument(skip(self, ctx), fields(method = "queue.getStats"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let office_id = OfficeId::from_string(require_string_param(params.as_ref(), "officeId")?);
        let stats = ctx.service.get_stats(&office_id).await?;
        to_value(stats)
    }
}

/// Expire every overdue session, optionally scoped to one office.
pub struct SweepExpiredHandler;

#[async_trait]
impl MethodHandler for SweepExpiredHandler {
    #[instrument(skip(self, ctx), fields(method = "queue.sweepExpired"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let office_id = opt_string_param(params.as_ref(), "officeId")?.map(OfficeId::from_string);
        let swept = ctx.service.sweep_expired(office_id.as_ref()).await?;
        Ok(json!({ "swept": swept }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
