//! Process-wide task counters, rendered in Prometheus text format.
//!
//! Mirrors the six named counters of the reference metrics module: created,
//! completed, failed, retried, canceled, and worker exceptions. Registered
//! once in a private [`prometheus::Registry`] and injected as part of
//! [`crate::state::AppState`] rather than kept as a module global.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub tasks_created_total: IntCounter,
    pub tasks_completed_total: IntCounter,
    pub tasks_failed_total: IntCounter,
    pub tasks_retried_total: IntCounter,
    pub tasks_canceled_total: IntCounter,
    pub worker_exceptions_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let tasks_created_total = IntCounter::new("tasks_created_total", "total tasks created").unwrap();
        let tasks_completed_total = IntCounter::new("tasks_completed_total", "total tasks completed").unwrap();
        let tasks_failed_total = IntCounter::new("tasks_failed_total", "total tasks failed").unwrap();
        let tasks_retried_total = IntCounter::new("tasks_retried_total", "total tasks retried").unwrap();
        let tasks_canceled_total = IntCounter::new("tasks_canceled_total", "total tasks canceled").unwrap();
        let worker_exceptions_total =
            IntCounter::new("worker_exceptions_total", "total unhandled worker exceptions").unwrap();

        for counter in [
            &tasks_created_total,
            &tasks_completed_total,
            &tasks_failed_total,
            &tasks_retried_total,
            &tasks_canceled_total,
            &worker_exceptions_total,
        ] {
            registry.register(Box::new(counter.clone())).unwrap();
        }

        Self {
            registry,
            tasks_created_total,
            tasks_completed_total,
            tasks_failed_total,
            tasks_retried_total,
            tasks_canceled_total,
            worker_exceptions_total,
        }
    }

    /// Render all registered counters in Prometheus exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
