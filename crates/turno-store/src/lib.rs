//! # turno-store
//!
//! `SQLite` persistence for the Turno queue engine.
//!
//! - **[`QueueStore`]**: High-level API — domain-typed session CRUD, queue
//!   reads in rank order, transactional ranking batches, office configs
//! - **[`connection`]**: `r2d2` pool with WAL mode, foreign keys, and
//!   performance pragmas applied to every connection
//! - **[`migrations`]**: Version-tracked schema evolution, embedded at
//!   compile time and run transactionally
//! - **[`repositories`]**: Stateless repository structs — each method takes
//!   `&Connection` and executes SQL. No shared mutable state.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, PragmaState, new_file, new_in_memory,
    verify_pragmas,
};
pub use errors::{Result, StoreError};
pub use migrations::{current_version, latest_version, run_migrations};
pub use repositories::session::{RankUpdate, UpdateSessionFields};
pub use store::{NewSessionOptions, QueueStore};
