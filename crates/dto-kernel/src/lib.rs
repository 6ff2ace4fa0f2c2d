//! DTO Micro-Kernel.
//!
//! Foundational task-orchestration services shared by the worker, scheduler
//! and API processes:
//!
//! - **[`state_machine`]** -- the closed set of legal task status transitions.
//! - **[`retry`]** -- exponential backoff with jitter for rescheduling failed
//!   attempts.
//! - **[`queue`]** -- Redis-backed FIFO work queue (`LPUSH`/`BRPOP`).
//! - **[`lock`]** -- Redis-backed distributed exclusion lock, one per task id.
//! - **[`error`]** -- unified kernel error types via [`thiserror`].
//!
//! All public types are `Send + Sync` and designed for use within a
//! multi-threaded tokio runtime.

pub mod error;
pub mod lock;
pub mod queue;
pub mod retry;
pub mod state_machine;

pub use error::{KernelError, Result};
pub use lock::{ExclusionLock, LockGuard};
pub use queue::{Queue, QueueEnvelope};
pub use retry::RetryPolicy;
pub use state_machine::{can_transition, TaskStatus};
