//! # Synchronous named-signal bus.
//!
//! [`EventBus`] maps a key to an ordered list of callbacks and invokes them
//! synchronously on `emit`. The task manager uses it as its router, keyed by
//! [`RouteKey`] (`task id` + `event name`).
//!
//! ## Rules
//! - **Registration order**: callbacks for one key run in the order they were subscribed.
//! - **Snapshot**: `emit` delivers to the callbacks registered when it is called.
//! - **Silent no-op**: emitting a key with no subscribers is not an error.
//! - **No locking**: `emit` takes `&mut self` and callbacks are not `Send`, so the
//!   bus is confined to the thread that owns it.
//! - **Isolation**: each callback runs under `catch_unwind`; a panicking callback is
//!   reported in [`EmitReport`] and the remaining callbacks still run.
//!
//! **Warning**: `AssertUnwindSafe` is used, so a callback that panics halfway through
//! mutating its captured state leaves that state as it was at the panic.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::panic_message;
use crate::tasks::TaskId;

/// Boxed subscriber callback.
pub type Callback<A> = Box<dyn FnMut(&A)>;

/// Typed routing key for task-scoped events.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteKey {
    /// Task the event belongs to.
    pub task: TaskId,
    /// Event name as emitted by the task.
    pub event: Arc<str>,
}

impl RouteKey {
    /// Builds a key for `(task, event)`.
    pub fn new(task: TaskId, event: impl Into<Arc<str>>) -> Self {
        Self {
            task,
            event: event.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task.{}.{}", self.task, self.event)
    }
}

/// Outcome of a single [`EventBus::emit`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmitReport {
    /// Number of callbacks that returned normally.
    pub delivered: usize,
    /// Panic messages of callbacks that panicked, in invocation order.
    pub panicked: Vec<String>,
}

impl EmitReport {
    /// Total number of callbacks invoked.
    pub fn invoked(&self) -> usize {
        self.delivered + self.panicked.len()
    }
}

/// Named-signal registry with ordered, synchronous delivery.
///
/// ## Example
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use taskrelay::EventBus;
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let mut bus: EventBus<&'static str, u32> = EventBus::new();
///
/// let sink = Rc::clone(&seen);
/// bus.subscribe("tick", move |n: &u32| sink.borrow_mut().push(*n));
///
/// bus.emit("tick", &1);
/// bus.emit("tock", &2); // nobody listens: no-op
/// assert_eq!(*seen.borrow(), vec![1]);
/// ```
pub struct EventBus<K, A> {
    handlers: HashMap<K, Vec<Callback<A>>>,
}

impl<K, A> EventBus<K, A>
where
    K: Eq + Hash,
{
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `callback` for `key`, after any callbacks already registered.
    pub fn subscribe<F>(&mut self, key: K, callback: F)
    where
        F: FnMut(&A) + 'static,
    {
        self.handlers
            .entry(key)
            .or_default()
            .push(Box::new(callback));
    }

    /// Invokes every callback registered for `key` with `payload`.
    pub fn emit<Q>(&mut self, key: &Q, payload: &A) -> EmitReport
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut report = EmitReport::default();
        let Some(callbacks) = self.handlers.get_mut(key) else {
            return report;
        };

        for cb in callbacks.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| cb(payload))) {
                Ok(()) => report.delivered += 1,
                Err(err) => report.panicked.push(panic_message(err.as_ref())),
            }
        }
        report
    }

    /// Returns how many callbacks are registered for `key`.
    pub fn subscribers<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.handlers.get(key).map_or(0, Vec::len)
    }

    /// Drops every key for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.handlers.retain(|k, _| keep(k));
    }

    /// Number of distinct keys with at least one callback.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<K: Eq + Hash, A> Default for EventBus<K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> fmt::Debug for EventBus<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("keys", &self.handlers.len())
            .finish()
    }
}
