//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A lease for the requested scope could not be taken before retries
    /// ran out. Retryable.
    #[error("lock busy: {key}")]
    LockBusy {
        /// The contended lock key.
        key: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::LockBusy { key, attempts } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "lock_busy",
                "scope is busy, retry the request".to_string(),
                Some(serde_json::json!({
                    "key": key,
                    "attempts": attempts
                })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<cardwise_store::StoreError> for ApiError {
    fn from(err: cardwise_store::StoreError) -> Self {
        match err {
            cardwise_store::StoreError::Database(msg)
            | cardwise_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<cardwise_lock::LockError> for ApiError {
    fn from(err: cardwise_lock::LockError) -> Self {
        match err {
            cardwise_lock::LockError::AcquireTimeout { key, attempts } => {
                Self::LockBusy { key, attempts }
            }
            cardwise_lock::LockError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<cardwise_core::ParseError> for ApiError {
    fn from(err: cardwise_core::ParseError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
