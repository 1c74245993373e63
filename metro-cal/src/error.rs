//! Error types for the metro-cal HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metro_common::api::OperationResult;
use thiserror::Error;

use crate::services::{CalibrationError, ErrorKind};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Conflict (409), e.g. a reminder sweep already running
    #[error("{0}")]
    Conflict(String),

    /// Required collaborator not configured (503)
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// Calibration engine failure, status picked by its kind
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// metro-common error
    #[error(transparent)]
    Common(#[from] metro_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Calibration(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::BusinessRule | ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Common(metro_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Common(metro_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self {
            ApiError::Calibration(err) => err.to_string(),
            ApiError::Common(metro_common::Error::InvalidInput(msg)) => msg,
            // Infrastructure failures get the engine's storage translation
            ApiError::Common(err) => CalibrationError::from(err).to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), message = %message, "Request failed");
        }

        (status, Json(OperationResult::failure(message))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
