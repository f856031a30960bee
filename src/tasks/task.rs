//! # Task abstraction, identity and shared state.
//!
//! This module defines the [`Task`] trait (blocking, runs on its own thread) and the
//! identity/state types every submitted task carries:
//! - [`TaskId`]: process-unique routing key, assigned when the spec is built
//! - [`TaskState`]: `Created → Running → Completed | Failed`
//! - [`TaskHandle`]: read-only, cheaply cloneable view kept by the submitter
//!
//! The common handle type for task logic is [`TaskRef`], an `Arc<dyn Task>`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use uuid::Uuid;

use crate::error::TaskError;
use crate::tasks::context::TaskContext;

/// Shared reference to task logic.
pub type TaskRef = Arc<dyn Task>;

/// # Unit of background work.
///
/// `run` executes exactly once, on a dedicated worker thread, and may block or
/// sleep freely. Progress is reported through [`TaskContext::emit`]; returning
/// (or panicking) ends the task and frees its slot.
///
/// # Example
/// ```
/// use taskrelay::{Task, TaskContext, TaskError};
/// use serde_json::json;
///
/// struct Countdown(u32);
///
/// impl Task for Countdown {
///     fn name(&self) -> &str { "countdown" }
///
///     fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
///         for n in (0..self.0).rev() {
///             if ctx.is_cancelled() {
///                 break;
///             }
///             ctx.emit("tick", [json!(n)]);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task to completion.
    ///
    /// Long-running implementations should check `ctx.is_cancelled()` so that
    /// shutdown can finish within its grace period.
    fn run(&self, ctx: &TaskContext) -> Result<(), TaskError>;
}

/// Process-unique task identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskState {
    /// Built but not started (possibly waiting in the queue).
    Created = 0,
    /// Holds a pool slot; its worker thread was started.
    Running = 1,
    /// Completion marker processed after a successful run.
    Completed = 2,
    /// `run` returned an error, panicked, or the thread could not be spawned.
    Failed = 3,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

struct Shared {
    id: TaskId,
    name: Arc<str>,
    daemon: bool,
    state: AtomicU8,
    reaped: AtomicBool,
}

/// Read-only view of a submitted task.
///
/// Cloning is cheap; all clones observe the same state. The state is written
/// only by the task manager and by the task's own worker thread.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<Shared>,
}

impl TaskHandle {
    pub(crate) fn new(name: &str, daemon: bool) -> Self {
        Self {
            inner: Arc::new(Shared {
                id: TaskId::new(),
                name: Arc::from(name),
                daemon,
                state: AtomicU8::new(TaskState::Created as u8),
                reaped: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the task id.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    /// Returns `true` if shutdown never waits for this task.
    pub fn is_daemon(&self) -> bool {
        self.inner.daemon
    }

    /// Returns the current state.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Returns `true` once the completion marker has been processed.
    pub fn is_reaped(&self) -> bool {
        self.inner.reaped.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    /// Final bookkeeping: `Running → Completed`, a `Failed` state is kept.
    pub(crate) fn mark_reaped(&self) {
        let _ = self.inner.state.compare_exchange(
            TaskState::Running as u8,
            TaskState::Completed as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.inner.reaped.store(true, Ordering::Release);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("daemon", &self.is_daemon())
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TaskHandle {}
