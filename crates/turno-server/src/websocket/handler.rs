//! WebSocket message dispatch — parses incoming text as `RpcRequest` and
//! routes through the `MethodRegistry`.

use tracing::{debug, instrument, warn};
use turno_rpc::context::RpcContext;
use turno_rpc::registry::MethodRegistry;
use turno_rpc::types::{RpcRequest, RpcResponse};

/// Result of handling a WebSocket message.
///
/// The session task inspects `method` and `response` after dispatch to apply
/// subscription changes (`events.subscribe`, `events.unsubscribe`, and the
/// auto-subscribe on `queue.join`) without re-parsing the JSON.
pub struct HandleResult {
    /// Serialized JSON response to send back.
    pub response_json: String,
    /// The RPC method that was called (empty if parse failed).
    pub method: String,
    /// Typed response.
    pub response: RpcResponse,
}

/// Handle an incoming WebSocket text message.
///
/// Parses the message as an `RpcRequest`, dispatches to the registry, and
/// returns the serialized `RpcResponse` along with the method name.
#[instrument(skip_all, fields(method))]
pub async fn handle_message(
    message: &str,
    registry: &MethodRegistry,
    ctx: &RpcContext,
) -> HandleResult {
    let request: RpcRequest = match serde_json::from_str(message) {
        Ok(r) => r,
        Err(e) => {
            warn!("invalid JSON received");
            let resp =
                RpcResponse::error("unknown", "INVALID_PARAMS", format!("Invalid JSON: {e}"));
            let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to serialize error response");
                String::new()
            });
            return HandleResult {
                response_json: json,
                method: String::new(),
                response: resp,
            };
        }
    };

    let method = request.method.clone();
    let id = &request.id;
    let _ = tracing::Span::current().record("method", method.as_str());
    debug!(method, id, "dispatching RPC");

    if !registry.has_method(&method) {
        warn!(method, "unknown RPC method");
    }

    let response = registry.dispatch(request, ctx).await;
    let json = serde_json::to_string(&response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        String::new()
    });
    HandleResult {
        response_json: json,
        method,
        response,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::Value;
    use tokio_util::sync::CancellationToken;
    use turno_engine::service::{QueueService, ServiceOptions};
    use turno_store::QueueStore;

    fn make_test_ctx() -> RpcContext {
        let pool =
            turno_store::new_in_memory(&turno_store::ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = turno_store::run_migrations(&conn).unwrap();
        }
        let store = Arc::new(QueueStore::new(pool));
        let service = Arc::new(QueueService::new(store, ServiceOptions::default()));
        RpcContext {
            service,
            shutdown: CancellationToken::new(),
            server_start_time: std::time::Instant::now(),
        }
    }

    fn full_registry() -> MethodRegistry {
        let mut reg = MethodRegistry::new();
        turno_rpc::handlers::register_all(&mut reg);
        reg
    }

    #[tokio::test]
    async fn valid_request_dispatches() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let msg = r#"{"id":"r1","method":"system.ping"}"#;
        let result = handle_message(msg, &reg, &ctx).await;
        assert_eq!(result.method, "system.ping");
        assert!(result.response.success);
        assert_eq!(result.response.id, "r1");
        let value: Value = serde_json::from_str(&result.response_json).unwrap();
        assert_eq!(value["success"], true);
    }

    #[tokio::test]
    async fn invalid_json_returns_error() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let result = handle_message("not json at all", &reg, &ctx).await;
        assert!(result.method.is_empty());
        let resp = result.response;
        assert!(!resp.success);
        assert_eq!(resp.id, "unknown");
        let err = resp.error.unwrap();
        assert_eq!(err.code, "INVALID_PARAMS");
        assert!(err.message.contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn empty_message_returns_error() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let result = handle_message("", &reg, &ctx).await;
        assert!(!result.response.success);
        assert_eq!(result.response.error.unwrap().code, "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn unknown_method_returns_not_found() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let msg = r#"{"id":"r2","method":"no.such"}"#;
        let result = handle_message(msg, &reg, &ctx).await;
        assert!(!result.response.success);
        assert_eq!(result.response.error.unwrap().code, "METHOD_NOT_FOUND");
    }

    #[tokio::test]
    async fn response_preserves_request_id() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let msg = r#"{"id":"unique_42","method":"system.ping"}"#;
        let result = handle_message(msg, &reg, &ctx).await;
        assert_eq!(result.response.id, "unique_42");
    }

    #[tokio::test]
    async fn json_missing_id_field_is_a_parse_error() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let msg = r#"{"method":"system.ping"}"#;
        let result = handle_message(msg, &reg, &ctx).await;
        assert!(!result.response.success);
        assert_eq!(result.response.id, "unknown");
    }

    #[tokio::test]
    async fn join_flows_through_to_the_engine() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let msg = r#"{"id":"j1","method":"queue.join","params":{"officeId":"ofi_centro","clientName":"Ana","tramiteType":"COMPRAVENTA"}}"#;
        let result = handle_message(msg, &reg, &ctx).await;
        assert_eq!(result.method, "queue.join");
        assert!(result.response.success);
        let session = result.response.result.unwrap();
        assert_eq!(session["clientName"], "Ana");
        assert_eq!(session["status"], "WAITING");
        assert!(session["id"].is_string());
    }

    #[tokio::test]
    async fn handler_error_carries_the_engine_code() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let msg = r#"{"id":"e1","method":"session.get","params":{"sessionId":"sess_missing"}}"#;
        let result = handle_message(msg, &reg, &ctx).await;
        assert!(!result.response.success);
        assert_eq!(result.response.error.unwrap().code, "NOT_FOUND");
    }
}
