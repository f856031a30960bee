//! # Task abstractions and specifications.
//!
//! This module provides the core task-related types:
//! - [`Task`] - trait for implementing blocking units of background work
//! - [`TaskFn`] - function-backed task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`] - task logic plus identity, submitted to the manager
//! - [`TaskHandle`] / [`TaskId`] / [`TaskState`] - identity and observable state
//! - [`TaskContext`] - emit events from inside `run`

pub(crate) mod context;
mod spec;
mod task;
mod task_fn;

pub use context::{COMPLETED_EVENT, FAILED_EVENT, TaskContext, is_reserved};
pub use spec::TaskSpec;
pub use task::{Task, TaskHandle, TaskId, TaskRef, TaskState};
pub use task_fn::TaskFn;
