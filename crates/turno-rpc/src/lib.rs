//! # turno-rpc
//!
//! The WebSocket RPC surface: wire types, method registry, and handlers.
//!
//! Requests are JSON frames `{id, method, params?, idempotencyKey?}`;
//! responses `{id, success, result? | error?}`; server-pushed events
//! `{type, topic, timestamp, data}`. The full method surface:
//! - Queue: join, get, getPosition, getStats, sweepExpired
//! - Session: get, markReady, activate, complete, cancel, extend,
//!   setPriority, delete
//! - Office: getConfig, updateConfig
//! - Events: subscribe, unsubscribe
//! - System: ping, getInfo, shutdown
//!
//! Duplicate clicks are safe without a reply cache: the engine reports a
//! repeated transition as a benign `applied: false` outcome, so handlers are
//! naturally idempotent. `idempotencyKey` is accepted and recorded in the
//! dispatch span only.

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;
