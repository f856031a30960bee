//! # Execution context handed to a running task.
//!
//! [`TaskContext`] is the only way a task talks to the outside world. Every
//! [`emit`](TaskContext::emit) becomes a message on the manager's inbound
//! channel; nothing is delivered on the worker thread.
//!
//! ## Reserved event names
//! - [`COMPLETED_EVENT`] (`__completed`): posted by the worker after `run` returns
//! - [`FAILED_EVENT`] (`__failed`): posted before `__completed` when `run` fails;
//!   args are `[message, label]` (see [`TaskError`])
//!
//! Tasks cannot emit either name themselves.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::inbound::{InboundSender, Message};
use crate::error::TaskError;
use crate::tasks::task::{TaskHandle, TaskId, TaskState};

/// Completion marker; never routed to `on` callbacks.
pub const COMPLETED_EVENT: &str = "__completed";

/// Failure event, posted before the completion marker when `run` fails.
pub const FAILED_EVENT: &str = "__failed";

/// Returns `true` for names the runtime posts on the task's behalf.
#[inline]
pub fn is_reserved(event: &str) -> bool {
    event == COMPLETED_EVENT || event == FAILED_EVENT
}

/// Task-scoped handle for emitting events and observing shutdown.
#[derive(Clone)]
pub struct TaskContext {
    task: TaskHandle,
    outbox: InboundSender,
    token: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(task: TaskHandle, outbox: InboundSender, token: CancellationToken) -> Self {
        Self {
            task,
            outbox,
            token,
        }
    }

    /// Id of the running task.
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Name of the running task.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Posts `event` with `args` to the consumer thread.
    ///
    /// Never blocks. If the manager is gone the event is dropped.
    pub fn emit<I>(&self, event: impl Into<Arc<str>>, args: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let event = event.into();
        if is_reserved(&event) {
            tracing::warn!(task = self.name(), event = %event, "refusing to emit reserved event");
            return;
        }
        self.post(event, args.into_iter().collect());
    }

    /// Returns `true` once the manager started shutting down.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled on shutdown, for tasks that hand it to async code.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Marks the task failed and posts [`FAILED_EVENT`].
    pub(crate) fn fail(&self, err: &TaskError) {
        self.task.set_state(TaskState::Failed);
        self.post(
            Arc::from(FAILED_EVENT),
            vec![
                Value::String(err.to_string()),
                Value::String(err.as_label().to_string()),
            ],
        );
    }

    /// Posts [`COMPLETED_EVENT`]; must be the last message of the task.
    pub(crate) fn complete(&self) {
        self.post(Arc::from(COMPLETED_EVENT), Vec::new());
    }

    fn post(&self, event: Arc<str>, args: Vec<Value>) {
        let msg = Message::new(self.task.id(), event, args);
        if !self.outbox.post(msg) {
            tracing::debug!(task = self.name(), "inbound channel closed, event dropped");
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", &self.task)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
