//! # turno-server
//!
//! The network surface of the queue daemon: an Axum HTTP server exposing
//! `/health`, `/metrics`, and the `/ws` WebSocket upgrade, plus the event
//! bridge that fans engine events out to subscribed clients.
//!
//! Clients speak the JSON RPC protocol from `turno-rpc` over the WebSocket.
//! Topic membership (`office:{id}` / `session:{id}`) lives on the
//! connection; the bridge serializes each wire event once and pushes the
//! shared payload to every subscriber.

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
