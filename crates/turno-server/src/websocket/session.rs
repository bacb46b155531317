//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use turno_rpc::context::RpcContext;
use turno_rpc::registry::MethodRegistry;
use turno_rpc::types::{RpcEvent, RpcResponse};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler::{handle_message, HandleResult};

/// Outbound send queue depth per connection.
const SEND_QUEUE_CAPACITY: usize = 1024;

/// Run a WebSocket session for a connected client.
///
/// 1. Sends a `connection-established` event with the client ID
/// 2. Dispatches incoming text frames as RPC requests
/// 3. Applies topic changes from `events.subscribe` / `events.unsubscribe`
///    and auto-subscribes the session topic on a successful `queue.join`
/// 4. Sends periodic Ping frames and disconnects unresponsive clients
/// 5. Cleans up on disconnect
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: String,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    broadcast: Arc<BroadcastManager>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_CAPACITY);
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));
    let disconnect = connection.disconnect_token();

    info!(client_id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    broadcast.add(connection.clone()).await;

    // Greet the client so it learns its connection ID immediately.
    let established = RpcEvent::new(
        "connection-established",
        "system",
        Some(serde_json::json!({ "clientId": client_id })),
    );
    if let Ok(json) = serde_json::to_string(&established) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = connection.clone();
    let outbound_cancel = connection.disconnect_token();
    let outbound = tokio::spawn(async move {
        let mut ping_timer = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ping_timer.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_timer.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        outbound_conn.disconnect();
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_cancel.cancelled() => break,
            }
        }
    });

    // Inbound loop.
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = disconnect.cancelled() => {
                info!(client_id, "connection force-closed");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        // Accept text from either Text or Binary frames; some client
        // libraries only send binary.
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    info!(client_id, len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!(client_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        connection.mark_alive();

        let result = handle_message(&text, &registry, &ctx).await;
        apply_subscriptions(&connection, &result);

        if !connection.send(Arc::new(result.response_json)) {
            info!(client_id, "failed to enqueue response (channel full or closed)");
        }
    }

    info!(client_id, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    outbound.abort();
    broadcast.remove(&client_id).await;
}

/// Apply topic membership changes implied by a successful RPC response.
fn apply_subscriptions(connection: &ClientConnection, result: &HandleResult) {
    if !result.response.success {
        return;
    }
    match result.method.as_str() {
        "events.subscribe" => {
            if let Some(topic) = result_str(&result.response, "subscribed") {
                connection.subscribe(topic.to_string());
                debug!(conn_id = %connection.id, topic, "subscribed");
            }
        }
        "events.unsubscribe" => {
            if let Some(topic) = result_str(&result.response, "unsubscribed") {
                connection.unsubscribe(topic);
                debug!(conn_id = %connection.id, topic, "unsubscribed");
            }
        }
        // A joining client always wants its own lifecycle events.
        "queue.join" => {
            if let Some(session_id) = result_str(&result.response, "id") {
                let topic = format!("session:{session_id}");
                connection.subscribe(topic.clone());
                debug!(conn_id = %connection.id, topic, "auto-subscribed on join");
            }
        }
        _ => {}
    }
}

fn result_str<'a>(response: &'a RpcResponse, key: &str) -> Option<&'a str> {
    response
        .result
        .as_ref()
        .and_then(|r| r.get(key))
        .and_then(|v| v.as_str())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
