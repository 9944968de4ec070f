//! Decisions, the subjects they authorize, and their audit trail.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{REASON_GRANTED, REASON_NO_MATCHING_SCHEDULE};
use crate::types::CredentialType;

/// Who is authorized, for which room.
///
/// Produced by the resolver, stored in the cache, attached to audit records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Authorized user
    pub user_id: String,
    /// Room the sensor belongs to
    pub room_id: String,
    /// Human-readable user name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Subject {
    /// Creates a subject without a display name.
    pub fn new(user_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            room_id: room_id.into(),
            display_name: None,
        }
    }

    /// Attaches a display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Cache value stored per sensor: credential key → subject.
///
/// The expiry of a bucket is tracked by the cache entry wrapping it, so every
/// key in a bucket shares one expiry.
pub type Bucket = HashMap<String, Subject>;

/// Identity recovered by the best-effort lookup that ignores schedules.
///
/// Only used to attribute a denied attempt in the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// User whose fingerprint/NFC id matched
    pub user_id: String,
    /// Room of the sensor
    pub room_id: String,
    /// User name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// The outcome of one authorization request. Never persisted directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Whether the door may open
    pub granted: bool,
    /// Authorized subject (granted decisions only)
    pub subject: Option<Subject>,
    /// Deny reason; empty when granted
    pub reason: String,
}

impl Decision {
    /// A granted decision for `subject`.
    pub fn granted(subject: Subject) -> Self {
        Self {
            granted: true,
            subject: Some(subject),
            reason: REASON_GRANTED.into(),
        }
    }

    /// A denied decision with the given reason.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            subject: None,
            reason: reason.into(),
        }
    }

    /// The deny decision used when no schedule matches.
    pub fn no_matching_schedule() -> Self {
        Self::denied(REASON_NO_MATCHING_SCHEDULE)
    }
}

/// One append-only entry of the access log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// User the attempt is attributed to
    pub user_id: String,
    /// Room of the sensor
    pub room_id: String,
    /// Credential type presented
    pub method: CredentialType,
    /// Whether access was granted
    pub granted: bool,
    /// Deny reason; empty when granted
    pub reason: String,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Record for a granted decision.
    pub fn granted(subject: &Subject, method: CredentialType) -> Self {
        Self {
            user_id: subject.user_id.clone(),
            room_id: subject.room_id.clone(),
            method,
            granted: true,
            reason: REASON_GRANTED.into(),
            timestamp: Utc::now(),
        }
    }

    /// Record for a denied decision attributed to a recovered identity.
    pub fn denied(identity: &Identity, method: CredentialType, reason: impl Into<String>) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            room_id: identity.room_id.clone(),
            method,
            granted: false,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}
