//! Office config handlers: getConfig, updateConfig.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use turno_core::config::QueueConfig;
use turno_core::ids::OfficeId;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::{require_param, require_string_param};
use crate::registry::MethodHandler;

/// The office's effective config (stored row or engine defaults).
pub struct GetConfigHandler;

#[async_trait]
impl MethodHandler for GetConfigHandler {
    #[instrument(skip(self, ctx), fields(method = "office.getConfig"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let office_id = OfficeId::from_string(require_string_param(params.as_ref(), "officeId")?);
        let config = ctx.service.get_config(&office_id)?;
        serde_json::to_value(config).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Merge a partial config update onto the office's current config and
/// persist the result.
pub struct UpdateConfigHandler;

#[async_trait]
impl MethodHandler for UpdateConfigHandler {
    #[instrument(skip(self, ctx), fields(method = "office.updateConfig"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let office_id = OfficeId::from_string(require_string_param(params.as_ref(), "officeId")?);
        let updates = require_param(params.as_ref(), "config")?;
        let Some(updates) = updates.as_object() else {
            return Err(RpcError::InvalidParams {
                message: "Parameter 'config' must be an object".into(),
            });
        };

        // Shallow-merge onto the current config so callers can send only the
        // keys they change.
        let current = ctx.service.get_config(&office_id)?;
        let mut merged = serde_json::to_value(current).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })?;
        if let Some(target) = merged.as_object_mut() {
            for (key, value) in updates {
                let _ = target.insert(key.clone(), value.clone());
            }
        }
        let config: QueueConfig =
            serde_json::from_value(merged).map_err(|e| RpcError::InvalidParams {
                message: format!("Invalid config: {e}"),
            })?;

        ctx.service.update_config(&office_id, &config)?;
        Ok(json!({ "officeId": office_id, "config": serde_json::to_value(config).map_err(|e| RpcError::Internal { message: e.to_string() })? }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
