//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use salesdesk_blob::BlobError;
use salesdesk_chat::ChatError;
use salesdesk_core::error::SalesdeskError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 401 Unauthorized - identity headers missing.
    Unauthorized(String),
    /// 404 Not Found - resource does not exist or is not the caller's.
    NotFound(String),
    /// 409 Conflict - state conflict (e.g., chat creation in progress).
    Conflict(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::SessionNotFound(_) => ApiError::NotFound("Session not found".to_string()),
            ChatError::NoActiveSession => ApiError::BadRequest("No active session".to_string()),
            ChatError::InvalidImage(msg) | ChatError::InvalidFeedback(msg) => {
                ApiError::BadRequest(msg)
            }
            ChatError::CreationInProgress | ChatError::EmptyChatExists => {
                ApiError::Conflict(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(_) => ApiError::NotFound("Document not found".to_string()),
            BlobError::InvalidName(_) => ApiError::BadRequest("Invalid filename".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SalesdeskError> for ApiError {
    fn from(err: SalesdeskError) -> Self {
        match &err {
            SalesdeskError::Config(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
