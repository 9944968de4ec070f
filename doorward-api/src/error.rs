//! API error handling.
//!
//! Errors are plain text, matching the success bodies door controllers parse.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use doorward_core::constants::NO_MATCHING_SCHEDULE_BODY;
use doorward_core::error::DoorwardError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// The deny response.
    pub fn no_matching_schedule() -> Self {
        Self::new(StatusCode::NOT_FOUND, NO_MATCHING_SCHEDULE_BODY)
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<DoorwardError> for ApiError {
    fn from(err: DoorwardError) -> Self {
        match &err {
            _ if err.is_validation_error() => ApiError::bad_request(err.to_string()),
            DoorwardError::NoMatchingSchedule => ApiError::no_matching_schedule(),
            _ if err.is_storage_error() => {
                tracing::error!(error = %err, "Schedule store query failed");
                ApiError::internal("Internal server error")
            }
            _ => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal("Internal server error")
            }
        }
    }
}
