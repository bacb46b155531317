//! End-to-end tests: a real listener, a real HTTP client, and a real
//! WebSocket client driving the join → activate → complete flow.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use turno_engine::service::{QueueService, ServiceOptions};
use turno_rpc::context::RpcContext;
use turno_rpc::registry::MethodRegistry;
use turno_server::config::ServerConfig;
use turno_server::server::TurnoServer;
use turno_server::websocket::event_bridge::{BridgeConfig, EventBridge};
use turno_store::QueueStore;

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    service: Arc<QueueService>,
    cancel: CancellationToken,
}

async fn boot() -> TestServer {
    let pool = turno_store::new_in_memory(&turno_store::ConnectionConfig::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        let _ = turno_store::run_migrations(&conn).unwrap();
    }
    let store = Arc::new(QueueStore::new(pool));
    let service = Arc::new(QueueService::new(store, ServiceOptions::default()));

    let mut registry = MethodRegistry::new();
    turno_rpc::handlers::register_all(&mut registry);

    let cancel = CancellationToken::new();
    let ctx = Arc::new(RpcContext {
        service: service.clone(),
        shutdown: cancel.clone(),
        server_start_time: Instant::now(),
    });

    let server = TurnoServer::new(ServerConfig::default(), registry, ctx, None);
    let bridge = EventBridge::new(
        service.subscribe(),
        server.broadcast().clone(),
        service.clone(),
        BridgeConfig {
            queue_update_throttle: Duration::from_millis(50),
            stats_interval: Duration::from_millis(100),
        },
    );
    let _ = tokio::spawn(bridge.run(cancel.clone()));

    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        addr,
        service,
        cancel,
    }
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Read frames until one parses with the given `type`, or panic on timeout.
async fn wait_for_event(ws: &mut WsClient, event_type: &str) -> Value {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        loop {
            let Some(Ok(msg)) = ws.next().await else {
                panic!("connection closed while waiting for {event_type}");
            };
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["type"] == event_type {
                    return value;
                }
            }
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
}

/// Send a request and read frames until its response arrives.
async fn call(ws: &mut WsClient, id: &str, method: &str, params: Value) -> Value {
    let request = json!({"id": id, "method": method, "params": params});
    ws.send(Message::Text(request.to_string().into()))
        .await
        .unwrap();

    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        loop {
            let Some(Ok(msg)) = ws.next().await else {
                panic!("connection closed while waiting for response to {method}");
            };
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["id"] == id {
                    return value;
                }
            }
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("timed out waiting for response to {method}"))
}

#[tokio::test]
async fn health_endpoint_over_http() {
    let server = boot().await;
    let url = format!("http://{}/health", server.addr);
    let resp = reqwest::get(&url).await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["waiting_sessions"], 0);
    server.cancel.cancel();
}

#[tokio::test]
async fn health_reflects_connections_and_waiting_sessions() {
    let server = boot().await;
    let mut ws = connect(server.addr).await;
    let _ = wait_for_event(&mut ws, "connection-established").await;

    let joined = call(
        &mut ws,
        "j1",
        "queue.join",
        json!({"officeId": "ofi_centro", "clientName": "Ana", "tramiteType": "COMPRAVENTA"}),
    )
    .await;
    assert_eq!(joined["success"], true);

    let url = format!("http://{}/health", server.addr);
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["connections"], 1);
    assert_eq!(body["waiting_sessions"], 1);
    server.cancel.cancel();
}

#[tokio::test]
async fn join_activate_complete_with_event_assertions() {
    let server = boot().await;

    // The client at the kiosk joins; it is auto-subscribed to its session
    // topic by the server.
    let mut client = connect(server.addr).await;
    let established = wait_for_event(&mut client, "connection-established").await;
    assert!(established["data"]["clientId"].is_string());

    let joined = call(
        &mut client,
        "j1",
        "queue.join",
        json!({"officeId": "ofi_centro", "clientName": "Ana", "tramiteType": "COMPRAVENTA"}),
    )
    .await;
    assert_eq!(joined["success"], true);
    let session_id = joined["result"]["id"].as_str().unwrap().to_string();
    assert_eq!(joined["result"]["position"], 1);

    // The operator console drives the lifecycle from its own connection.
    let mut operator = connect(server.addr).await;
    let _ = wait_for_event(&mut operator, "connection-established").await;

    let ready = call(
        &mut operator,
        "o1",
        "session.markReady",
        json!({"sessionId": session_id}),
    )
    .await;
    assert_eq!(ready["success"], true);
    let event = wait_for_event(&mut client, "session-ready").await;
    assert_eq!(event["topic"], format!("session:{session_id}"));
    assert_eq!(event["data"]["session"]["status"], "READY");

    let called = call(
        &mut operator,
        "o2",
        "session.activate",
        json!({"sessionId": session_id}),
    )
    .await;
    assert_eq!(called["success"], true);
    let event = wait_for_event(&mut client, "session-called").await;
    assert_eq!(event["data"]["session"]["status"], "ACTIVE");

    let completed = call(
        &mut operator,
        "o3",
        "session.complete",
        json!({"sessionId": session_id}),
    )
    .await;
    assert_eq!(completed["success"], true);
    assert_eq!(completed["result"]["applied"], true);
    let event = wait_for_event(&mut client, "session-completed").await;
    assert_eq!(event["data"]["session"]["status"], "COMPLETED");

    server.cancel.cancel();
}

#[tokio::test]
async fn office_subscribers_see_queue_updates() {
    let server = boot().await;

    let mut watcher = connect(server.addr).await;
    let _ = wait_for_event(&mut watcher, "connection-established").await;
    let subscribed = call(
        &mut watcher,
        "s1",
        "events.subscribe",
        json!({"topic": "office:ofi_centro"}),
    )
    .await;
    assert_eq!(subscribed["success"], true);

    let mut client = connect(server.addr).await;
    let _ = wait_for_event(&mut client, "connection-established").await;
    let joined = call(
        &mut client,
        "j1",
        "queue.join",
        json!({"officeId": "ofi_centro", "clientName": "Beto", "tramiteType": "PODER"}),
    )
    .await;
    assert_eq!(joined["success"], true);

    let update = wait_for_event(&mut watcher, "queue-updated").await;
    assert_eq!(update["topic"], "office:ofi_centro");
    assert_eq!(update["data"]["queue"].as_array().unwrap().len(), 1);
    assert_eq!(update["data"]["queue"][0]["clientName"], "Beto");
    assert_eq!(update["data"]["stats"]["waitingCount"], 1);

    // Stats follow on their own cadence.
    let stats = wait_for_event(&mut watcher, "stats-updated").await;
    assert_eq!(stats["data"]["waitingCount"], 1);

    server.cancel.cancel();
}

#[tokio::test]
async fn invalid_frames_get_error_responses_not_disconnects() {
    let server = boot().await;
    let mut ws = connect(server.addr).await;
    let _ = wait_for_event(&mut ws, "connection-established").await;

    ws.send(Message::Text("definitely not json".into()))
        .await
        .unwrap();
    let deadline = Duration::from_secs(5);
    let error = tokio::time::timeout(deadline, async {
        loop {
            let Some(Ok(msg)) = ws.next().await else {
                panic!("connection closed");
            };
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["success"] == false {
                    return value;
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(error["error"]["code"], "INVALID_PARAMS");

    // The connection is still usable.
    let pong = call(&mut ws, "p1", "system.ping", json!({})).await;
    assert_eq!(pong["success"], true);

    server.cancel.cancel();
}

#[tokio::test]
async fn engine_state_is_shared_with_direct_service_access() {
    let server = boot().await;
    let mut ws = connect(server.addr).await;
    let _ = wait_for_event(&mut ws, "connection-established").await;

    let joined = call(
        &mut ws,
        "j1",
        "queue.join",
        json!({"officeId": "ofi_centro", "clientName": "Carla", "tramiteType": "TESTAMENTO"}),
    )
    .await;
    let session_id = joined["result"]["id"].as_str().unwrap();

    let session = server
        .service
        .get_session(&turno_core::ids::SessionId::from(session_id))
        .await
        .unwrap();
    assert_eq!(session.client_name, "Carla");

    server.cancel.cancel();
}
