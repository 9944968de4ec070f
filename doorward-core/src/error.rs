//! Error types for Doorward.
//!
//! This module provides the error hierarchy using `thiserror`. The variants
//! follow the decision taxonomy: validation failures never reach the store,
//! store failures abort the request, persistence failures stay local to the
//! background audit path.

use thiserror::Error;

/// Result type alias using `DoorwardError`.
pub type Result<T> = std::result::Result<T, DoorwardError>;

/// Main error type for all Doorward operations.
#[derive(Debug, Error)]
pub enum DoorwardError {
    // ═══════════════════════════════════════════════════════════════════════════
    // REQUEST ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Malformed or incomplete request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No schedule satisfies the authorization predicates.
    #[error("No matching schedule found")]
    NoMatchingSchedule,

    // ═══════════════════════════════════════════════════════════════════════════
    // STORE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The schedule store failed for a reason other than "no rows".
    #[error("Store error: {0}")]
    Store(String),

    /// The audit sink failed to persist a record.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A store snapshot is internally inconsistent.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION & I/O ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION & INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DoorwardError {
    /// Returns true if the caller may retry the same request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DoorwardError::Store(_))
    }

    /// Returns true if this error stems from the request itself.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, DoorwardError::Validation(_) | DoorwardError::Json(_))
    }

    /// Returns true if this error belongs to a storage backend.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            DoorwardError::Store(_)
                | DoorwardError::Persistence(_)
                | DoorwardError::InvalidSnapshot(_)
        )
    }
}
