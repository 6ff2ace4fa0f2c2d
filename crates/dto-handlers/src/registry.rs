//! Task handler trait and concurrent registry.
//!
//! A [`TaskHandler`] maps a task's JSON payload to a JSON result. Handlers
//! are registered under a `task_type` string at process start and looked up
//! by the worker for each claimed task. The registry is backed by
//! [`DashMap`] so it can be shared read-mostly across worker tasks without a
//! global lock.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::{HandlerError, Result};

/// A task handler: transforms a payload into a result, or fails.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, payload: Value) -> Result<Value>;
}

/// Concurrent registry of named task handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<DashMap<String, Arc<dyn TaskHandler>>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Register a handler under `task_type`, overwriting any existing entry.
    pub fn register(&self, task_type: impl Into<String>, handler: impl TaskHandler + 'static) {
        let task_type = task_type.into();
        tracing::info!(task_type = %task_type, "handler registered");
        self.inner.insert(task_type, Arc::new(handler));
    }

    /// Look up a handler by `task_type`.
    pub fn get(&self, task_type: &str) -> Result<Arc<dyn TaskHandler>> {
        self.inner
            .get(task_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| HandlerError::UnknownTaskType(task_type.to_string()))
    }

    /// Execute the handler registered for `task_type` against `payload`.
    pub async fn dispatch(&self, task_type: &str, payload: Value) -> Result<Value> {
        let handler = self.get(task_type)?;
        handler.execute(payload).await
    }

    /// Return the sorted list of registered task types.
    #[must_use]
    pub fn registered_task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.inner.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }
}

/// Build a registry with the three reference handlers installed.
#[must_use]
pub fn with_reference_handlers() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    registry.register("cpu_burn", crate::cpu_burn::CpuBurnHandler);
    registry.register("data_transform", crate::data_transform::DataTransformHandler);
    registry.register("http_fetch", crate::http_fetch::HttpFetchHandler::new());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn execute(&self, payload: Value) -> Result<Value> {
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn register_and_dispatch() {
        let registry = HandlerRegistry::new();
        registry.register("echo", Echo);

        let out = registry
            .dispatch("echo", serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_task_type_errors() {
        let registry = HandlerRegistry::new();
        let err = registry.dispatch("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, HandlerError::UnknownTaskType(t) if t == "nope"));
    }

    #[test]
    fn reference_handlers_are_all_registered() {
        let registry = with_reference_handlers();
        assert_eq!(
            registry.registered_task_types(),
            vec!["cpu_burn", "data_transform", "http_fetch"]
        );
    }
}
