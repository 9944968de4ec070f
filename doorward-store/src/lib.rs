//! # Doorward Store
//!
//! Schedule store gateways and audit sinks for the Doorward decision engine.
//!
//! This crate provides multiple backends:
//!
//! - **Memory**: In-process schedule model + audit log for development and testing
//! - **Snapshot**: JSON seed files loaded into the memory store
//! - **SQL** (feature `turso`): libSQL/Turso gateway over the relational schema
//!
//! ## Example
//!
//! ```rust,ignore
//! use doorward_store::{MemoryStore, StoreSnapshot};
//!
//! let snapshot = StoreSnapshot::load("seed.json").await?;
//! let store = MemoryStore::from_snapshot(snapshot)?;
//!
//! let grant = store.find_grant(&query).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;
mod snapshot;
#[cfg(feature = "turso")]
mod sql;

pub use memory::{MemoryStore, StoreStats};
pub use snapshot::StoreSnapshot;
#[cfg(feature = "turso")]
pub use sql::SqlStore;

// Re-export the traits from core
pub use doorward_core::traits::{AuditSink, ScheduleGateway};
