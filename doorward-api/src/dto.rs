//! Request/response types for the API.

use serde::{Deserialize, Serialize};

/// Query of `POST /clear-access-cache`.
#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheQuery {
    /// Comma-separated sensor ids; absent or empty clears everything
    #[serde(rename = "sensorIds")]
    pub sensor_ids: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Sensors with a live cache bucket
    pub cached_sensors: usize,
}
