//! # Task manager configuration.
//!
//! Provides [`ManagerConfig`] centralized settings for the task manager.
//!
//! Config is consumed by [`TaskManagerBuilder`](crate::TaskManagerBuilder)
//! which validates it before any worker can be started.
//!
//! ## Rules
//! - `max_concurrent = 0` is rejected (a pool with no slots would never start anything)
//! - `grace = 0s` → shutdown does not wait for non-daemon tasks at all

use std::time::Duration;

use crate::error::RuntimeError;

/// Concurrency limit used when nothing else is configured.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Configuration for the task manager.
///
/// ## Field semantics
/// - `max_concurrent`: number of tasks allowed in `Running` state at once (must be > 0)
/// - `grace`: maximum wait for non-daemon tasks during shutdown
/// - `thread_name_prefix`: worker threads are named `{prefix}-{task name}`
/// - `stack_size`: optional stack size for worker threads (`None` = platform default)
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Maximum number of tasks running simultaneously.
    ///
    /// Tasks added beyond this limit wait in a FIFO queue.
    pub max_concurrent: usize,

    /// Maximum time shutdown waits for non-daemon tasks.
    ///
    /// Daemon tasks are never waited on.
    pub grace: Duration,

    /// Prefix for worker thread names.
    pub thread_name_prefix: String,

    /// Stack size for worker threads, in bytes.
    pub stack_size: Option<usize>,
}

impl ManagerConfig {
    /// Creates a default config with the given concurrency limit.
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            ..Self::default()
        }
    }

    /// Checks the config for values the manager cannot run with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_concurrent == 0 {
            return Err(RuntimeError::InvalidConcurrency {
                max_concurrent: self.max_concurrent,
            });
        }
        Ok(())
    }

    /// Builds the thread name for a task.
    #[inline]
    pub(crate) fn thread_name(&self, task: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, task)
    }
}

impl Default for ManagerConfig {
    /// Default configuration:
    ///
    /// - `max_concurrent = 10`
    /// - `grace = 60s`
    /// - `thread_name_prefix = "taskrelay"`
    /// - `stack_size = None`
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            grace: Duration::from_secs(60),
            thread_name_prefix: "taskrelay".to_string(),
            stack_size: None,
        }
    }
}
