//! # Inbound channel between worker threads and the consumer thread.
//!
//! Workers post [`Message`]s through an [`InboundSender`]; the manager pops them
//! with [`Inbound::try_next`] inside `drain`. A [`Readiness`] handle wakes the
//! host loop whenever something was posted.
//!
//! ## Architecture
//! ```text
//! Producers (many):                          Consumer (one):
//!   worker 1 ──┐
//!   worker 2 ──┼── post() ──► [unbounded mpsc] ──► try_next() ── drain()
//!   worker N ──┘      │                                ▲
//!                     └──► Notify::notify_one ──► Readiness::wait()
//! ```
//!
//! ## Rules
//! - **Non-blocking post**: `post()` never blocks (unbounded channel).
//! - **FIFO**: messages are popped in the order their sends were linearized.
//! - **No lost wake-ups**: `notify_one` stores a permit when nobody waits, so a post that
//!   races with the end of a drain still wakes the next `wait()`.
//! - **Spurious wakes** are possible (a permit left by a message already drained);
//!   draining an empty channel is a no-op.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Notify, mpsc};

use crate::tasks::TaskId;

/// Immutable message crossing the thread boundary.
#[derive(Debug, Clone)]
pub(crate) struct Message {
    pub(crate) task_id: TaskId,
    pub(crate) event: Arc<str>,
    pub(crate) args: Vec<Value>,
}

impl Message {
    pub(crate) fn new(task_id: TaskId, event: Arc<str>, args: Vec<Value>) -> Self {
        Self {
            task_id,
            event,
            args,
        }
    }
}

/// Producer side, cloned into every task context.
#[derive(Clone)]
pub(crate) struct InboundSender {
    tx: mpsc::UnboundedSender<Message>,
    notify: Arc<Notify>,
}

impl InboundSender {
    /// Pushes `msg` and signals readiness. Returns `false` if the consumer is gone.
    pub(crate) fn post(&self, msg: Message) -> bool {
        if self.tx.send(msg).is_err() {
            return false;
        }
        self.notify.notify_one();
        true
    }
}

/// Consumer side, owned by the task manager.
pub(crate) struct Inbound {
    rx: mpsc::UnboundedReceiver<Message>,
    sender: InboundSender,
}

impl Inbound {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            sender: InboundSender {
                tx,
                notify: Arc::new(Notify::new()),
            },
        }
    }

    /// Returns a new producer handle.
    pub(crate) fn sender(&self) -> InboundSender {
        self.sender.clone()
    }

    /// Pops the next message without waiting.
    ///
    /// The manager keeps a sender alive, so the channel never reports disconnection.
    pub(crate) fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn readiness(&self) -> Readiness {
        Readiness {
            notify: Arc::clone(&self.sender.notify),
        }
    }
}

/// Readiness handle for the host loop.
///
/// Resolves [`wait`](Readiness::wait) after at least one message was posted since the
/// previous wake. Call [`TaskManager::drain`](crate::TaskManager::drain) afterwards,
/// on the thread that owns the manager.
///
/// Each post wakes a single waiter. Clones share one signal, so await exactly one
/// `Readiness` at a time: a [`Reactor`](crate::Reactor) and a raw clone waiting
/// side by side can starve each other.
///
/// ## Example
/// ```rust,no_run
/// # async fn host(mut manager: taskrelay::TaskManager) {
/// let ready = manager.readiness();
/// loop {
///     ready.wait().await;
///     manager.drain();
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct Readiness {
    notify: Arc<Notify>,
}

impl Readiness {
    /// Waits until the inbound channel may hold messages.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness").finish_non_exhaustive()
    }
}
