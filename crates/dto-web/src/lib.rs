//! # dto-web
//!
//! The HTTP surface of the task orchestrator: submission, lookup,
//! cursor-paginated listing, cancel, health, and Prometheus metrics.
//! Everything under `/v1` requires a matching `X-Api-Key` header
//! (see [`auth::require_api_key`]).
//!
//! The submission service is implemented directly in [`api::create_task`]
//! against the shared [`state::AppState`] rather than as a separate
//! service object, keeping route handlers thin.

pub mod api;
pub mod auth;
pub mod error;
pub mod metrics;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, WebServer};
pub use state::{AppState, WebConfig};
