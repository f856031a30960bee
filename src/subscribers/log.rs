//! # LogWriter: lifecycle events as `tracing` records
//!
//! A subscriber that turns every lifecycle [`Event`] into a `tracing` record.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG taskrelay: [queued] task="sync" queued=1
//! DEBUG taskrelay: [starting] task="sync" running=2
//!  WARN taskrelay: [failed] task="sync" reason="execution failed: disk full"
//! DEBUG taskrelay: [completed] task="sync" running=1
//!  INFO taskrelay: [shutdown-requested]
//!  WARN taskrelay: [grace-exceeded] stuck="indexer"
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::TaskQueued => {
                tracing::debug!(target: "taskrelay", "[queued] task={task:?} queued={:?}", e.queued);
            }
            EventKind::TaskStarting => {
                tracing::debug!(target: "taskrelay", "[starting] task={task:?} running={:?}", e.running);
            }
            EventKind::TaskFailed => {
                tracing::warn!(target: "taskrelay", "[failed] task={task:?} reason={reason:?}");
            }
            EventKind::TaskCompleted => {
                tracing::debug!(target: "taskrelay", "[completed] task={task:?} running={:?}", e.running);
            }
            EventKind::TaskRemoved => {
                tracing::info!(target: "taskrelay", "[removed] task={task:?}");
            }
            EventKind::CallbackPanicked => {
                tracing::warn!(target: "taskrelay", "[callback-panicked] task={task:?} {reason}");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "taskrelay", "[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "taskrelay", "[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(target: "taskrelay", "[grace-exceeded] stuck={reason:?}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
