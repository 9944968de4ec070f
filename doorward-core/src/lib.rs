//! # Doorward Core
//!
//! Core types, errors, and traits for the Doorward access authorization engine.
//!
//! This crate provides the foundational building blocks used by all other Doorward crates:
//!
//! - **Types**: Credentials, subjects, decisions, audit records and the read-only schedule model
//! - **Errors**: The error taxonomy shared by the resolver, the stores and the HTTP layer
//! - **Constants**: Response bodies, deny reasons and time formats
//! - **Traits**: The collaborator seams (`ScheduleGateway`, `AuditSink`, `Notifier`, `Clock`)
//!
//! ## Example
//!
//! ```rust
//! use doorward_core::{Credential, CredentialType};
//!
//! let credential: Credential =
//!     serde_json::from_str(r#"{"sensorId":"S1","key":"F1","type":"FINGERPRINT"}"#).unwrap();
//! assert_eq!(credential.kind, CredentialType::Fingerprint);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{DoorwardError, Result};
pub use traits::*;
pub use types::*;
