//! Credentials presented at door sensors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DoorwardError, Result};

/// The kind of identifier a sensor read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CredentialType {
    /// Fingerprint template identifier
    Fingerprint,
    /// NFC tag identifier
    Nfc,
}

impl CredentialType {
    /// Returns the wire/storage name (`FINGERPRINT` or `NFC`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::Fingerprint => "FINGERPRINT",
            CredentialType::Nfc => "NFC",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = DoorwardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FINGERPRINT" => Ok(CredentialType::Fingerprint),
            "NFC" => Ok(CredentialType::Nfc),
            other => Err(DoorwardError::Validation(format!(
                "unknown credential type: {}",
                other
            ))),
        }
    }
}

/// A credential presented at a sensor. One per request, never mutated.
///
/// # Wire Format
/// ```text
/// {"sensorId": "S1", "key": "F1", "type": "FINGERPRINT"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Sensor that read the credential
    pub sensor_id: String,
    /// Fingerprint or NFC identifier
    pub key: String,
    /// Which identifier `key` is
    #[serde(rename = "type")]
    pub kind: CredentialType,
}

impl Credential {
    /// Creates a new credential.
    pub fn new(sensor_id: impl Into<String>, key: impl Into<String>, kind: CredentialType) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            key: key.into(),
            kind,
        }
    }

    /// Decodes a credential from a raw request body.
    ///
    /// Any undecodable body is a validation error.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let credential: Credential = serde_json::from_slice(body)
            .map_err(|e| DoorwardError::Validation(e.to_string()))?;
        credential.validate()?;
        Ok(credential)
    }

    /// Validates the credential structure.
    pub fn validate(&self) -> Result<()> {
        if self.sensor_id.trim().is_empty() {
            return Err(DoorwardError::Validation("sensorId is required".into()));
        }
        if self.key.trim().is_empty() {
            return Err(DoorwardError::Validation("key is required".into()));
        }
        Ok(())
    }
}
