//! # Lifecycle events emitted by the task manager.
//!
//! These are the process-wide bookkeeping events (task queued, started,
//! completed, ...). They are separate from the task-scoped events a task emits
//! through its [`TaskContext`](crate::TaskContext): those are routed to `on`
//! callbacks, these go to [`Subscribe`](crate::Subscribe) observers.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskrelay::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("indexer")
//!     .with_reason("disk full");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("indexer"));
//! assert_eq!(ev.reason.as_deref(), Some("disk full"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::tasks::TaskId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle events ===
    /// Task was added while every slot was busy and now waits in the queue.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `queued`: queue length after insertion
    TaskQueued,

    /// Task got a slot and its worker thread is being started.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `running`: running count including this task
    TaskStarting,

    /// Task reported a failure (error, panic or spawn failure).
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `reason`: failure message
    TaskFailed,

    /// Completion marker processed; the slot is free again.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `running`: running count after release
    TaskCompleted,

    /// Pending task discarded without ever running (shutdown).
    ///
    /// Sets:
    /// - `task`, `task_id`
    TaskRemoved,

    // === Dispatch events ===
    /// An `on` callback panicked while handling a task event.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `reason`: `event=<name> panic=<message>`
    CallbackPanicked,

    // === Shutdown events ===
    /// Shutdown requested (explicit call or OS signal).
    ShutdownRequested,

    /// All non-daemon tasks finished within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some non-daemon tasks did not finish in time.
    ///
    /// Sets:
    /// - `reason`: names of stuck tasks
    GraceExceeded,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Id of the task, if applicable.
    pub task_id: Option<TaskId>,
    /// Human-readable reason (errors, panic details, stuck tasks).
    pub reason: Option<Arc<str>>,
    /// Running task count observed by the manager.
    pub running: Option<u32>,
    /// Pending queue length observed by the manager.
    pub queued: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            reason: None,
            running: None,
            queued: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the running count.
    #[inline]
    pub fn with_running(mut self, n: usize) -> Self {
        self.running = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches the pending queue length.
    #[inline]
    pub fn with_queued(mut self, n: usize) -> Self {
        self.queued = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Returns `true` for events that describe a task failing or misbehaving.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskFailed | EventKind::CallbackPanicked | EventKind::GraceExceeded
        )
    }
}
