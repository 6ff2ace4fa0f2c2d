//! HTTP error mapping for the task API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use dto_store::StoreError;

/// An API-facing error, carrying the HTTP status it maps to.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized,
    TooLarge,
    NotFound,
    Conflict(&'static str),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "request too large".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MalformedCursor => ApiError::Validation("invalid cursor".to_string()),
            StoreError::DuplicateIdempotencyKey { .. } => ApiError::Internal(err.to_string()),
            StoreError::NotFound { .. } => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<dto_kernel::KernelError> for ApiError {
    fn from(err: dto_kernel::KernelError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
