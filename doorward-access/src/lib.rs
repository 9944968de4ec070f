//! # Doorward Access
//!
//! The authorization decision engine.
//!
//! - [`Resolver`]: cache probe, then store query, then bucket update
//! - [`AccessService`]: one decision per request plus one detached audit unit
//! - [`AuditDispatcher`]: tracked fire-and-forget audit writes, drained on shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use doorward_access::{AccessCache, AccessService};
//! use doorward_store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::from_snapshot(snapshot)?);
//! let service = AccessService::new(Arc::new(AccessCache::new()), store.clone(), store);
//! let decision = service.verify(credential).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod audit;
pub mod notify;
pub mod resolver;
pub mod service;

pub use audit::AuditDispatcher;
pub use notify::{LogNotifier, NoopNotifier};
pub use resolver::{AccessCache, DecisionSource, Resolution, Resolver};
pub use service::{AccessService, ClearScope};
