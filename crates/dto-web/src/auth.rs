//! API-key authentication middleware and request-size guard.
//!
//! Every route under `/v1` requires a matching `X-Api-Key` header; requests
//! whose `Content-Length` exceeds `max_request_bytes` are rejected before
//! the body is read.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(len) = request
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if len > state.config.max_request_bytes {
            return Err(ApiError::TooLarge);
        }
    }

    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.config.api_key => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}
