//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all Axum handlers.
//! It bundles the task store, the work queue, the metrics registry, and the
//! resolved HTTP configuration — everything a route needs, injected rather
//! than reached for through a module global.

use dto_kernel::Queue;
use dto_store::{Database, TaskStore};

use crate::metrics::Metrics;

/// HTTP-facing configuration, resolved once at process start from
/// environment variables by `dto-cli`.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// Port the HTTP listener binds to.
    pub port: u16,
    /// Required value of the `X-Api-Key` header on every `/v1` route.
    pub api_key: String,
    /// Requests whose `Content-Length` exceeds this are rejected with 413.
    pub max_request_bytes: u64,
    /// `max_attempts` stamped onto every task created without an override.
    pub default_max_attempts: i32,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            api_key: "dev-key".to_string(),
            max_request_bytes: 1_048_576,
            default_max_attempts: 5,
        }
    }
}

/// Shared state accessible from every Axum handler.
pub struct AppState {
    pub tasks: TaskStore,
    pub queue: Queue,
    pub metrics: Metrics,
    pub config: WebConfig,
    /// Kept alive only so on-disk temp databases in tests outlive the state.
    #[cfg(test)]
    _tempdir: Option<tempfile::TempDir>,
}

impl AppState {
    pub fn new(db: Database, queue: Queue, config: WebConfig) -> Self {
        Self {
            tasks: TaskStore::new(db),
            queue,
            metrics: Metrics::new(),
            config,
            #[cfg(test)]
            _tempdir: None,
        }
    }

    /// Build an `AppState` for tests: a real `Queue` handle over a throwaway
    /// Redis URL (connection is lazy — nothing is dialed until `enqueue`/
    /// `dequeue` runs) and an on-disk SQLite database kept alive by `tempdir`.
    #[cfg(test)]
    pub fn new_for_test(db: Database, config: WebConfig, tempdir: tempfile::TempDir) -> Self {
        let queue = Queue::new("redis://127.0.0.1:6399/0", "dto:test:queue")
            .expect("redis client construction does not dial the server");
        Self {
            tasks: TaskStore::new(db),
            queue,
            metrics: Metrics::new(),
            config,
            _tempdir: Some(tempdir),
        }
    }
}
