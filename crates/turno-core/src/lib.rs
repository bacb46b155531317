//! # turno-core
//!
//! Foundation types, branded IDs, and utilities for the Turno queue engine.
//!
//! This crate provides the shared vocabulary that all other Turno crates depend on:
//!
//! - **Branded IDs**: `SessionId`, `OfficeId` as newtypes for type safety
//! - **Session model**: `QueueSession` with status, priority, position, and the
//!   append-only lifecycle event log carried in `metadata`
//! - **Enums**: `SessionStatus`, `Priority`, `TramiteType`, `LifecycleAction`
//! - **Office config**: `QueueConfig` with capacity, timeout, and estimation knobs
//! - **Stats**: `QueueStats` snapshot types
//! - **Engine events**: `QueueEvent` enum broadcast to WebSocket subscribers
//! - **Time**: fixed-width RFC 3339 helpers so stored timestamps sort lexically

#![deny(unsafe_code)]

pub mod config;
pub mod events;
pub mod ids;
pub mod logging;
pub mod session;
pub mod stats;
pub mod time;
pub mod types;
