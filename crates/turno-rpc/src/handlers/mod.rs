//! RPC handler modules and registration.

pub mod events;
pub mod office;
pub mod queue;
pub mod session;
pub mod system;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::RpcError;
use crate::registry::MethodRegistry;

/// Register all RPC handlers with the registry.
pub fn register_all(registry: &mut MethodRegistry) {
    // Queue
    registry.register("queue.join", queue::JoinQueueHandler);
    registry.register("queue.get", queue::GetQueueHandler);
    registry.register("queue.getPosition", queue::GetPositionHandler);
    registry.register("queue.getStats", queue::GetStatsHandler);
    registry.register("queue.sweepExpired", queue::SweepExpiredHandler);

    // Session
    registry.register("session.get", session::GetSessionHandler);
    registry.register("session.markReady", session::MarkReadyHandler);
    registry.register("session.activate", session::ActivateHandler);
    registry.register("session.complete", session::CompleteHandler);
    registry.register("session.cancel", session::CancelHandler);
    registry.register("session.extend", session::ExtendHandler);
    registry.register("session.setPriority", session::SetPriorityHandler);
    registry.register("session.delete", session::DeleteSessionHandler);

    // Office
    registry.register("office.getConfig", office::GetConfigHandler);
    registry.register("office.updateConfig", office::UpdateConfigHandler);

    // Events
    registry.register("events.subscribe", events::SubscribeHandler);
    registry.register("events.unsubscribe", events::UnsubscribeHandler);

    // System
    registry.register("system.ping", system::PingHandler);
    registry.register("system.getInfo", system::GetInfoHandler);
    registry.register("system.shutdown", system::ShutdownHandler);
}

/// Extract a required parameter from the params object.
pub(crate) fn require_param<'a>(
    params: Option<&'a Value>,
    key: &str,
) -> Result<&'a Value, RpcError> {
    params
        .and_then(|p| p.get(key))
        .filter(|v| !v.is_null())
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Missing required parameter: {key}"),
        })
}

/// Extract a required string parameter.
pub(crate) fn require_string_param(
    params: Option<&Value>,
    key: &str,
) -> Result<String, RpcError> {
    require_param(params, key)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a string"),
        })
}

/// Extract an optional string parameter.
pub(crate) fn opt_string_param(
    params: Option<&Value>,
    key: &str,
) -> Result<Option<String>, RpcError> {
    match params.and_then(|p| p.get(key)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a string"),
        }),
    }
}

/// Extract a required `u32` parameter.
pub(crate) fn require_u32_param(params: Option<&Value>, key: &str) -> Result<u32, RpcError> {
    require_param(params, key)?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a non-negative integer"),
        })
}

/// Extract an optional `u32` parameter.
pub(crate) fn opt_u32_param(params: Option<&Value>, key: &str) -> Result<Option<u32>, RpcError> {
    match params.and_then(|p| p.get(key)) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| RpcError::InvalidParams {
                message: format!("Parameter '{key}' must be a non-negative integer"),
            }),
    }
}

/// Deserialize a wire enum value (`"NORMAL"`, `"COMPRAVENTA"`, ...).
pub(crate) fn parse_enum<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, RpcError> {
    serde_json::from_value(value.clone()).map_err(|_| RpcError::InvalidParams {
        message: format!("Parameter '{key}' has an unrecognized value: {value}"),
    })
}


// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use turno_core::types::Priority;

    #[test]
    fn register_all_populates_registry() {
        let mut reg = MethodRegistry::new();
        register_all(&mut reg);
        assert!(reg.has_method("queue.join"));
        assert!(reg.has_method("session.setPriority"));
        assert!(reg.has_method("office.updateConfig"));
        assert!(reg.has_method("events.subscribe"));
        assert!(reg.has_method("system.shutdown"));
        assert_eq!(reg.methods().len(), 20);
    }

    #[test]
    fn require_param_missing() {
        let params = Some(json!({"other": 1}));
        let err = require_param(params.as_ref(), "name").unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[test]
    fn require_param_null_counts_as_missing() {
        let params = Some(json!({"name": null}));
        assert!(require_param(params.as_ref(), "name").is_err());
    }

    #[test]
    fn require_string_param_wrong_type() {
        let params = Some(json!({"id": 42}));
        let err = require_string_param(params.as_ref(), "id").unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn opt_string_param_absent_is_none() {
        assert_eq!(opt_string_param(None, "reason").unwrap(), None);
        let params = Some(json!({"reason": null}));
        assert_eq!(opt_string_param(params.as_ref(), "reason").unwrap(), None);
    }

    #[test]
    fn u32_params_reject_negatives_and_floats() {
        let params = Some(json!({"minutes": -5}));
        assert!(require_u32_param(params.as_ref(), "minutes").is_err());
        let params = Some(json!({"minutes": 1.5}));
        assert!(opt_u32_param(params.as_ref(), "minutes").is_err());
        let params = Some(json!({"minutes": 30}));
        assert_eq!(require_u32_param(params.as_ref(), "minutes").unwrap(), 30);
    }

    #[test]
    fn parse_enum_maps_wire_names() {
        let priority: Priority = parse_enum("priority", &json!("CRITICAL")).unwrap();
        assert_eq!(priority, Priority::Critical);
        let err = parse_enum::<Priority>("priority", &json!("URGENTE")).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }
}
