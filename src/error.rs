//! Error types used by the taskrelay runtime and by tasks.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: errors raised by the task manager itself.
//! - [`TaskError`]: errors raised by individual task executions.
//!
//! Both types provide `as_label` for logs/metrics. Neither ever crosses the
//! consumer thread as a panic: task failures travel as `__failed` messages.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the taskrelay runtime.
///
/// These represent failures of the manager itself: an invalid configuration
/// at construction time or a shutdown that outlived its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configured concurrency limit cannot admit any task.
    #[error("max_concurrent must be at least 1 (got {max_concurrent})")]
    InvalidConcurrency {
        /// The rejected limit.
        max_concurrent: usize,
    },

    /// Shutdown grace period was exceeded; some non-daemon tasks were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the non-daemon tasks that did not finish in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskrelay::RuntimeError;
    ///
    /// let err = RuntimeError::InvalidConcurrency { max_concurrent: 0 };
    /// assert_eq!(err.as_label(), "runtime_invalid_concurrency");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConcurrency { .. } => "runtime_invalid_concurrency",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::InvalidConcurrency { max_concurrent } => {
                format!("invalid concurrency limit {max_concurrent}")
            }
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
        }
    }
}

/// # Errors produced by task execution.
///
/// Returned from [`Task::run`](crate::Task::run) or synthesized by the
/// execution context. Whatever the variant, the task's slot is always
/// released and subscribers of the `__failed` event receive [`TaskError::reason`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task logic reported a failure.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// Task logic panicked; the panic was contained on the worker thread.
    #[error("task panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text.
        reason: String,
    },

    /// The worker thread could not be created.
    #[error("failed to spawn worker thread: {reason}")]
    Spawn {
        /// The OS error message.
        reason: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskrelay::TaskError;
    ///
    /// let err = TaskError::fail("disk full");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Spawn { .. } => "task_spawn_failed",
        }
    }

    /// Returns the bare reason without the variant prefix.
    pub fn reason(&self) -> &str {
        match self {
            TaskError::Fail { reason }
            | TaskError::Panicked { reason }
            | TaskError::Spawn { reason } => reason,
        }
    }
}

/// Renders a panic payload the way `std` prints it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
