//! # Non-blocking lifecycle fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`]: distributes lifecycle events to multiple
//! subscribers without ever blocking the consumer thread that publishes them.
//!
//! ## Architecture
//! ```text
//! emit(event)                         (consumer thread, inside drain/add)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → tracing::warn, keep going
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` uses `try_send` and returns immediately
//! - **Overflow**: event dropped for that subscriber only, logged with `tracing::warn!`
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//! - An empty set spawns nothing and needs no runtime
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::panic_message;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for lifecycle subscribers.
#[derive(Default)]
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// ### Notes
    /// - Must be called inside a tokio runtime when `subs` is not empty
    /// - Minimum queue capacity is 1 (enforced)
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        tracing::warn!(
                            subscriber = sub.name(),
                            info = %panic_message(panic_err.as_ref()),
                            "subscriber panicked"
                        );
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self { channels, workers }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` when there is nobody to deliver to.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an event to all subscribers (clones the event).
    pub fn emit(&self, event: &Event) {
        if self.channels.is_empty() {
            return;
        }
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// - Uses `try_send` (non-blocking)
    /// - On queue full or closed: drops the event for that subscriber and warns
    pub fn emit_arc(&self, event: Arc<Event>) {
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = channel.name, kind = ?event.kind, "subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Shutdown events race with worker teardown; not worth a warning.
                    if !matches!(event.kind, EventKind::AllStoppedWithin | EventKind::GraceExceeded) {
                        tracing::warn!(subscriber = channel.name, kind = ?event.kind, "subscriber closed, event dropped");
                    }
                }
            }
        }
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// 1. Drops all channel senders (workers see channel closed)
    /// 2. Awaits all worker tasks, so queued events are still handled
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

impl std::fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.channels.iter().map(|c| c.name).collect();
        f.debug_struct("SubscriberSet")
            .field("subscribers", &names)
            .finish()
    }
}
