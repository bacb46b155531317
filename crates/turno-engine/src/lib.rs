//! # turno-engine
//!
//! The queue engine: session lifecycle, ordering, timers, and stats.
//!
//! - **Service**: [`service::QueueService`] is the single façade every caller
//!   goes through. One instance per process, shared as `Arc`.
//! - **Lifecycle**: the transition table lives in [`lifecycle`]; illegal moves
//!   are rejected, duplicate moves are benign no-ops.
//! - **Ordering**: [`ordering`] computes dense 1..N positions and wait
//!   estimates in one pass, persisted as a batch.
//! - **Timers**: one-shot expiry tasks per session with a generation counter
//!   so a stale timer can never expire a rescued session.
//! - **Concurrency**: one async mutex per office; offices never contend with
//!   each other.

#![deny(unsafe_code)]

pub mod config_cache;
pub mod emitter;
pub mod errors;
pub mod lifecycle;
pub mod locks;
pub mod ordering;
pub mod service;
pub mod stats;
pub mod sweep;
pub mod timers;
