//! # Task specification submitted to the manager.
//!
//! A [`TaskSpec`] bundles task logic with its identity (id, daemon flag). The id
//! is assigned when the spec is built, so callbacks can be registered with
//! [`TaskManager::on`](crate::TaskManager::on) before the task is added.
//!
//! ## Rules
//! - The spec is moved into [`TaskManager::add`](crate::TaskManager::add), so each
//!   spec runs at most once.
//! - Keep a [`TaskHandle`] (via [`TaskSpec::handle`]) to subscribe and to observe state.

use crate::tasks::task::{TaskHandle, TaskId, TaskRef};

/// Specification for running a task under the manager.
///
/// ## Example
/// ```rust
/// use taskrelay::{TaskContext, TaskError, TaskFn, TaskSpec, TaskState};
///
/// let spec = TaskSpec::daemon(TaskFn::arc("scan", |_ctx: &TaskContext| Ok::<_, TaskError>(())));
/// let handle = spec.handle();
///
/// assert!(handle.is_daemon());
/// assert_eq!(handle.name(), "scan");
/// assert_eq!(handle.state(), TaskState::Created);
/// ```
pub struct TaskSpec {
    task: TaskRef,
    handle: TaskHandle,
}

impl TaskSpec {
    /// Creates a non-daemon spec: shutdown waits for it (up to the grace period).
    pub fn new(task: TaskRef) -> Self {
        Self::build(task, false)
    }

    /// Creates a daemon spec: shutdown never waits for it.
    pub fn daemon(task: TaskRef) -> Self {
        Self::build(task, true)
    }

    fn build(task: TaskRef, daemon: bool) -> Self {
        let handle = TaskHandle::new(task.name(), daemon);
        Self { task, handle }
    }

    /// Returns a read-only handle sharing this task's identity and state.
    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }

    /// Returns the task id.
    pub fn id(&self) -> TaskId {
        self.handle.id()
    }

    /// Convenience: returns the task name.
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Returns reference to the task logic.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    pub(crate) fn into_parts(self) -> (TaskRef, TaskHandle) {
        (self.task, self.handle)
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("handle", &self.handle)
            .finish()
    }
}
