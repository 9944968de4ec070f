//! API route handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use tracing::debug;

use doorward_access::ClearScope;
use doorward_core::constants::{
    ACCESS_GRANTED_BODY, ACCESS_GRANTED_GREETING_PREFIX, CACHE_CLEARED_BODY,
};
use doorward_core::error::DoorwardError;
use doorward_core::types::Credential;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// POST /verify-access
///
/// The body is decoded from raw bytes so that a missing content type, bad
/// JSON or an unknown credential type all surface as 400.
pub async fn verify_access(State(state): State<Arc<AppState>>, body: Bytes) -> Result<String> {
    let credential = Credential::from_json(&body)?;
    let decision = state.service.verify(credential).await?;

    if !decision.granted {
        return Err(DoorwardError::NoMatchingSchedule.into());
    }

    let name = decision
        .subject
        .and_then(|s| s.display_name)
        .filter(|_| state.config.include_display_name);

    Ok(match name {
        Some(name) => format!("{}{}", ACCESS_GRANTED_GREETING_PREFIX, name),
        None => ACCESS_GRANTED_BODY.to_string(),
    })
}

/// POST /clear-access-cache
pub async fn clear_access_cache(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClearCacheQuery>,
) -> String {
    let scope = ClearScope::parse(query.sensor_ids.as_deref());
    let removed = state.service.clear_cache(&scope);
    debug!(removed, "Cleared access cache");

    match scope {
        ClearScope::All => CACHE_CLEARED_BODY.to_string(),
        ClearScope::Sensors(ids) => {
            format!("{} for sensorIds: {}", CACHE_CLEARED_BODY, ids.join(","))
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cached_sensors: state.service.cache_stats().valid_entries,
    })
}
