//! # dto-handlers
//!
//! The task handler trait, a concurrent registry, and the three reference
//! handlers demonstrated against the orchestrator: `cpu_burn`,
//! `data_transform`, and `http_fetch`.

pub mod cpu_burn;
pub mod data_transform;
pub mod error;
pub mod http_fetch;
pub mod registry;

pub use error::{HandlerError, Result};
pub use registry::{with_reference_handlers, HandlerRegistry, TaskHandler};
