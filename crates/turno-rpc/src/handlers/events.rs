//! Topic subscription handlers.
//!
//! The handlers validate the request and echo the topic; the WebSocket
//! session layer owns the per-connection topic set and applies the change
//! when it sees a successful response from one of these methods.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// Validate a topic string: `office:{id}` or `session:{id}`.
pub fn validate_topic(topic: &str) -> Result<(), RpcError> {
    let valid = topic
        .strip_prefix("office:")
        .or_else(|| topic.strip_prefix("session:"))
        .is_some_and(|suffix| !suffix.is_empty());
    if valid {
        Ok(())
    } else {
        Err(RpcError::InvalidParams {
            message: format!("Invalid topic '{topic}': expected office:{{id}} or session:{{id}}"),
        })
    }
}

/// Subscribe the connection to a topic.
pub struct SubscribeHandler;

#[async_trait]
impl MethodHandler for SubscribeHandler {
    #[instrument(skip(self, _ctx), fields(method = "events.subscribe"))]
    async fn handle(&self, params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        let topic = require_string_param(params.as_ref(), "topic")?;
        validate_topic(&topic)?;
        Ok(json!({ "subscribed": topic }))
    }
}

/// Unsubscribe the connection from a topic.
pub struct UnsubscribeHandler;

#[async_trait]
impl MethodHandler for UnsubscribeHandler {
    #[instrument(skip(self, _ctx), fields(method = "events.unsubscribe"))]
    async fn handle(&self, params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        let topic = require_string_param(params.as_ref(), "topic")?;
        validate_topic(&topic)?;
        Ok(json!({ "unsubscribed": topic }))
    }
}
