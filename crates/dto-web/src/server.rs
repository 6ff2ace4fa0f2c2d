//! Axum router assembly and HTTP listener startup.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use dto_kernel::Queue;
use dto_store::Database;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::require_api_key;
use crate::state::{AppState, WebConfig};

/// Build the full `/v1` router, with API-key auth applied to every route.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/tasks", post(api::create_task).get(api::list_tasks))
        .route("/v1/tasks/{id}", get(api::get_task))
        .route("/v1/tasks/{id}/cancel", post(api::cancel_task))
        .route("/v1/health", get(api::health))
        .route("/v1/metrics", get(api::metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Owns the listener lifecycle for the `serve` subcommand.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(db: Database, queue: Queue, config: WebConfig) -> Self {
        let state = Arc::new(AppState::new(db, queue, config.clone()));
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Start the server and block until the listener is closed.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = build_router(self.state);

        tracing::info!(addr = %addr, "starting HTTP API");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
