//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(&TaskContext) -> Result<(), TaskError>`.
//! The closure is shared with the worker thread, so it must be `Send + Sync`;
//! state it mutates belongs behind `Arc<Mutex<..>>` or atomics.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use taskrelay::{TaskContext, TaskFn, TaskRef, TaskError};
//!
//! let t: TaskRef = TaskFn::arc("worker", |ctx: &TaskContext| {
//!     ctx.emit("progress", [json!(50)]);
//!     Ok::<_, TaskError>(())
//! });
//!
//! assert_eq!(t.name(), "worker");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::TaskError;
use crate::tasks::context::TaskContext;
use crate::tasks::task::Task;

/// Function-backed task implementation.
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Task for TaskFn<F>
where
    F: Fn(&TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        (self.f)(ctx)
    }
}

impl<F> fmt::Debug for TaskFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn").field("name", &self.name).finish()
    }
}
