//! Kernel error types.
//!
//! All kernel subsystems surface errors through [`KernelError`], which is the
//! single error type returned by every public API in this crate.  Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.

use crate::state_machine::TaskStatus;

/// Unified error type for the DTO micro-kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The proposed `(from, to)` pair is not in the allowed-transition set.
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    /// Publishing a task id onto the queue failed at the transport level.
    #[error("queue publish failed: {reason}")]
    QueuePublishFailed { reason: String },

    /// Popping from the queue failed (distinct from a timeout, which is `Ok(None)`).
    #[error("queue dequeue failed: {reason}")]
    QueueDequeueFailed { reason: String },

    /// Acquiring or releasing the exclusion lock failed at the transport level.
    #[error("lock operation failed for {task_id}: {reason}")]
    LockFailed { task_id: String, reason: String },

    /// Underlying Redis transport error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
