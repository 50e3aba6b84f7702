//! Error types for the attendance service
//!
//! [`AttendanceError`] carries the typed kinds callers act on; [`ApiError`]
//! maps them onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::InvalidTransition;

/// Domain error returned by every service operation
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Class, lecture, entry or dispute missing (never retried)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Wrong status for the requested transition (re-fetch before retrying)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Ownership or role mismatch
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists; the existing one is authoritative
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Time-bounded action attempted after its window closed
    #[error("Window expired: {0}")]
    WindowExpired(String),

    /// Malformed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Face service rejected the images (4xx)
    #[error("Photos unusable: {0}")]
    PhotosUnusable(String),

    /// Face service timed out, failed or was unreachable
    #[error("Matching service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(rollcall_common::Error),
}

impl AttendanceError {
    /// Only upstream failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttendanceError::UpstreamUnavailable(_))
    }

    /// Stable error code used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::NotFound(_) => "NOT_FOUND",
            AttendanceError::InvalidState(_) => "INVALID_STATE",
            AttendanceError::Forbidden(_) => "FORBIDDEN",
            AttendanceError::Conflict(_) => "CONFLICT",
            AttendanceError::WindowExpired(_) => "WINDOW_EXPIRED",
            AttendanceError::Validation(_) => "VALIDATION_ERROR",
            AttendanceError::PhotosUnusable(_) => "PHOTOS_UNUSABLE",
            AttendanceError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AttendanceError::Database(_) => "DATABASE_ERROR",
            AttendanceError::Common(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::InvalidState(_) | AttendanceError::Conflict(_) => StatusCode::CONFLICT,
            AttendanceError::Forbidden(_) => StatusCode::FORBIDDEN,
            AttendanceError::Validation(_) | AttendanceError::WindowExpired(_) => {
                StatusCode::BAD_REQUEST
            }
            AttendanceError::PhotosUnusable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AttendanceError::Database(_) | AttendanceError::Common(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<rollcall_common::Error> for AttendanceError {
    fn from(err: rollcall_common::Error) -> Self {
        match err {
            rollcall_common::Error::NotFound(msg) => AttendanceError::NotFound(msg),
            rollcall_common::Error::InvalidInput(msg) => AttendanceError::Validation(msg),
            rollcall_common::Error::Database(e) => AttendanceError::Database(e),
            other => AttendanceError::Common(other),
        }
    }
}

impl From<InvalidTransition> for AttendanceError {
    fn from(err: InvalidTransition) -> Self {
        AttendanceError::InvalidState(err.to_string())
    }
}

/// Map a unique-constraint violation to `Conflict`, passing other errors through
pub fn conflict_on_unique(err: rollcall_common::Error, message: impl Into<String>) -> AttendanceError {
    if err.is_unique_violation() {
        AttendanceError::Conflict(message.into())
    } else {
        err.into()
    }
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed identity headers (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error("Common error: {0}")]
    Common(#[from] rollcall_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Attendance(ref err) => (err.status_code(), err.code(), err.to_string()),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "Request failed: {}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(AttendanceError::UpstreamUnavailable("timeout".into()).is_retryable());
        assert!(!AttendanceError::Conflict("dup".into()).is_retryable());
        assert!(!AttendanceError::PhotosUnusable("no faces".into()).is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AttendanceError::InvalidState("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AttendanceError::WindowExpired("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AttendanceError::PhotosUnusable("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AttendanceError::UpstreamUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_common_errors_keep_their_kind() {
        let err: AttendanceError = rollcall_common::Error::NotFound("Lecture".into()).into();
        assert!(matches!(err, AttendanceError::NotFound(_)));

        let err: AttendanceError = rollcall_common::Error::InvalidInput("bad".into()).into();
        assert!(matches!(err, AttendanceError::Validation(_)));
    }

    #[test]
    fn test_transition_error_is_invalid_state() {
        use crate::models::{Lifecycle, LectureStatus};
        let err: AttendanceError = LectureStatus::Locked
            .transition(LectureStatus::Created)
            .unwrap_err()
            .into();
        assert!(matches!(err, AttendanceError::InvalidState(_)));
    }
}
