//! Domain types for Doorward.
//!
//! This module provides the data structures shared by the engine and its collaborators:
//!
//! - [`Credential`]: What a sensor presents (fingerprint or NFC identifier)
//! - [`Subject`]: Who is authorized, for which room
//! - [`Decision`]: The grant/deny outcome of one request
//! - [`AuditRecord`]: The append-only trace of a decision
//! - [`Schedule`] and friends: The read-only access-control model

mod credential;
mod decision;
mod schedule;

pub use credential::*;
pub use decision::*;
pub use schedule::*;
