//! Error types for the offload dispatcher
//!
//! Every failure a caller can observe arrives through the pending task's
//! result. Codec and config errors convert into [`OffloadError`] with `?`.

use crate::config::ConfigError;
use crate::protocol::{CodecError, TaskId, TaskKind};
use std::time::Duration;
use thiserror::Error;

/// Main error type for offloaded tasks
#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("Task {task_id} timed out after {timeout_ms}ms")]
    Timeout { task_id: TaskId, timeout_ms: u64 },

    #[error("Task {task_id} failed in background worker: {message}")]
    TaskFailed { task_id: TaskId, message: String },

    #[error("Background worker failed: {reason}")]
    WorkerFailed { reason: String },

    #[error("Dispatcher shut down before task {task_id} completed")]
    Shutdown { task_id: TaskId },

    #[error("Dispatcher is no longer running")]
    DispatcherClosed,

    #[error("Task {task_id} expected a {expected} result but received {actual}")]
    UnexpectedOutput {
        task_id: TaskId,
        expected: TaskKind,
        actual: TaskKind,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl OffloadError {
    /// Create timeout error
    pub fn timeout(task_id: TaskId, after: Duration) -> Self {
        Self::Timeout {
            task_id,
            timeout_ms: after.as_millis() as u64,
        }
    }

    /// Create per-task failure reported by the worker
    pub fn task_failed<S: Into<String>>(task_id: TaskId, message: S) -> Self {
        Self::TaskFailed {
            task_id,
            message: message.into(),
        }
    }

    /// Create catastrophic worker failure
    pub fn worker_failed<S: Into<String>>(reason: S) -> Self {
        Self::WorkerFailed {
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_worker_failure(&self) -> bool {
        matches!(self, Self::WorkerFailed { .. })
    }
}

/// Result type for offload operations
pub type OffloadResult<T> = Result<T, OffloadError>;
