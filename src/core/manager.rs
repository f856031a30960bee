//! # TaskManager: bounded worker pool with consumer-thread event delivery.
//!
//! The [`TaskManager`] owns the registry, the router and the inbound channel. It
//! lives on one thread (the *consumer thread*, usually the UI/event-loop thread)
//! and every callback registered with [`TaskManager::on`] runs there, inside
//! [`TaskManager::drain`].
//!
//! ## Architecture
//! ```text
//! add(spec) ──► slot free? ──yes──► start: state=Running, spawn "{prefix}-{name}" thread
//!                  │                          │
//!                  no                         ▼
//!                  ▼                     task.run(ctx)  ── ctx.emit(ev, args) ──┐
//!           pending (FIFO)                    │                                 │
//!                  ▲                          └── __failed? + __completed ──────┤
//!                  │                                                            ▼
//!                  │                                                 [inbound mpsc] ──► Readiness
//!                  │                                                            │
//! drain() ◄────────┼────────────────────────────────────────────────────────────┘
//!   ├─ unknown id       → dropped (trace)
//!   ├─ __completed      → release slot, purge routes, promote pending ──┘
//!   ├─ __failed         → TaskFailed lifecycle event, then routed like any event
//!   └─ (id, event)      → callbacks in registration order, each isolated
//! ```
//!
//! ## Rules
//! - Never more than `max_concurrent` tasks hold a slot.
//! - Slots are taken in `add`/promotion and released only while draining `__completed`.
//! - `add`, `on` and `drain` never block; `drain` on an empty channel returns `0`.
//! - Lifecycle [`Event`]s go to [`Subscribe`](crate::Subscribe) observers, never to `on` callbacks.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::{
    builder::TaskManagerBuilder,
    config::ManagerConfig,
    inbound::{Inbound, Message, Readiness},
    registry::{Entry, Registry},
    worker,
};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Event, EventBus, EventKind, RouteKey};
use crate::subscribers::SubscriberSet;
use crate::tasks::{COMPLETED_EVENT, FAILED_EVENT, TaskContext, TaskHandle, TaskId, TaskSpec, TaskState};

/// Payload handed to routed callbacks.
pub(crate) struct Delivery {
    task: TaskHandle,
    args: Vec<Value>,
}

/// Bounded pool of worker threads whose events are delivered on the owning thread.
///
/// The manager is `!Send`: callbacks capture consumer-thread state.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use taskrelay::{ManagerConfig, TaskContext, TaskError, TaskFn, TaskManager, TaskSpec};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), taskrelay::RuntimeError> {
/// let mut manager = TaskManager::new(ManagerConfig::with_max_concurrent(2))?;
///
/// let spec = TaskSpec::new(TaskFn::arc("count", |ctx: &TaskContext| {
///     for i in 0..3 {
///         ctx.emit("progress", [json!(i)]);
///     }
///     Ok::<_, TaskError>(())
/// }));
/// let handle = manager.add(spec);
/// manager.on(&handle, "progress", |task, args| println!("{}: {:?}", task.name(), args));
///
/// let ready = manager.readiness();
/// while !manager.is_idle() {
///     ready.wait().await;
///     manager.drain();
/// }
/// manager.shutdown().await
/// # }
/// ```
pub struct TaskManager {
    cfg: ManagerConfig,
    registry: Registry,
    routes: EventBus<RouteKey, Delivery>,
    inbound: Inbound,
    subs: SubscriberSet,
    runtime_token: CancellationToken,
}

impl TaskManager {
    /// Creates a manager without lifecycle subscribers.
    ///
    /// Fails with [`RuntimeError::InvalidConcurrency`] if `max_concurrent` is zero.
    pub fn new(cfg: ManagerConfig) -> Result<Self, RuntimeError> {
        Self::builder(cfg).build()
    }

    /// Returns a builder for a manager with lifecycle subscribers.
    pub fn builder(cfg: ManagerConfig) -> TaskManagerBuilder {
        TaskManagerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: ManagerConfig, subs: SubscriberSet) -> Self {
        Self {
            cfg,
            registry: Registry::new(),
            routes: EventBus::new(),
            inbound: Inbound::new(),
            subs,
            runtime_token: CancellationToken::new(),
        }
    }

    /// Submits a task.
    ///
    /// Starts it right away when a slot is free, otherwise appends it to the
    /// pending queue. Returns the task's handle either way.
    pub fn add(&mut self, spec: TaskSpec) -> TaskHandle {
        let handle = spec.handle();
        if self.registry.running_len() < self.cfg.max_concurrent {
            self.start(spec);
        } else {
            self.registry.enqueue(spec);
            let queued = self.registry.pending_len();
            tracing::debug!(task = handle.name(), queued, "all slots busy, task queued");
            self.publish(
                Event::new(EventKind::TaskQueued)
                    .with_task(handle.name_arc())
                    .with_task_id(handle.id())
                    .with_queued(queued),
            );
        }
        handle
    }

    /// Registers `callback` for `event` emitted by the task behind `handle`.
    ///
    /// May be called before or after [`add`](Self::add). Events already drained are
    /// not replayed. Registrations for a task whose completion was processed, and for
    /// the completion marker itself, are ignored.
    ///
    /// Routes are released when the task's completion is drained, or when shutdown
    /// discards it from the queue. Callbacks for a spec that is never added stay
    /// registered until the manager is dropped.
    pub fn on<F>(&mut self, handle: &TaskHandle, event: impl Into<Arc<str>>, mut callback: F)
    where
        F: FnMut(&TaskHandle, &[Value]) + 'static,
    {
        let event = event.into();
        if handle.is_reaped() {
            tracing::debug!(task = handle.name(), event = %event, "task already completed, callback ignored");
            return;
        }
        if &*event == COMPLETED_EVENT {
            tracing::warn!(task = handle.name(), "completion marker is not routable, callback ignored");
            return;
        }
        self.routes.subscribe(
            RouteKey::new(handle.id(), event),
            move |d: &Delivery| callback(&d.task, &d.args),
        );
    }

    /// Processes every message currently in the inbound channel.
    ///
    /// Returns the number of messages processed (including dropped stale ones).
    pub fn drain(&mut self) -> usize {
        self.registry.reap_exited();

        let mut processed = 0;
        while let Some(msg) = self.inbound.try_next() {
            processed += 1;
            self.dispatch(msg);
        }
        processed
    }

    /// Number of tasks holding a slot.
    pub fn running(&self) -> usize {
        self.registry.running_len()
    }

    /// Number of tasks waiting for a slot.
    pub fn pending(&self) -> usize {
        self.registry.pending_len()
    }

    /// Returns `true` when nothing is running or queued.
    pub fn is_idle(&self) -> bool {
        self.running() == 0 && self.pending() == 0
    }

    /// State of a running or queued task; `None` once its completion was processed.
    ///
    /// Keep the [`TaskHandle`] to observe the final state.
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.registry.find(&id).map(|h| h.state())
    }

    /// Handle that wakes the host loop when [`drain`](Self::drain) has work.
    pub fn readiness(&self) -> Readiness {
        self.inbound.readiness()
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.cfg
    }

    /// Shuts the manager down.
    ///
    /// 1. publishes `ShutdownRequested` and cancels every task's token
    /// 2. discards pending tasks (`TaskRemoved`)
    /// 3. keeps draining until no non-daemon task holds a slot, for at most `grace`
    ///
    /// Daemon tasks are never waited on. Returns [`RuntimeError::GraceExceeded`]
    /// listing the non-daemon tasks still running when the grace period ran out;
    /// those threads are detached. Dropping a manager without calling this joins
    /// its non-daemon tasks instead, without a time limit.
    pub async fn shutdown(mut self) -> Result<(), RuntimeError> {
        tracing::info!(
            running = self.registry.running_len(),
            pending = self.registry.pending_len(),
            "shutdown requested"
        );
        self.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        self.discard_pending();

        let grace = self.cfg.grace;
        let readiness = self.inbound.readiness();
        let waited = tokio::time::timeout(grace, async {
            loop {
                self.drain();
                if !self.registry.has_non_daemon() {
                    break;
                }
                readiness.wait().await;
            }
        })
        .await;

        let outcome = match waited {
            Ok(()) => {
                self.registry.join_exiting();
                self.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.registry.non_daemon_names();
                tracing::warn!(?grace, ?stuck, "grace period exceeded");
                self.publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                // Already reported; dropping the manager must not block on them.
                self.registry.detach_running();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };

        std::mem::take(&mut self.subs).shutdown().await;
        outcome
    }

    /// Removes every pending task together with the routes registered for it.
    fn discard_pending(&mut self) {
        for spec in self.registry.take_pending() {
            let handle = spec.handle();
            let id = handle.id();
            tracing::debug!(task = handle.name(), "pending task removed");
            self.routes.retain(|key| key.task != id);
            self.publish(
                Event::new(EventKind::TaskRemoved)
                    .with_task(handle.name_arc())
                    .with_task_id(id),
            );
        }
    }

    fn dispatch(&mut self, msg: Message) {
        let Some(handle) = self.registry.handle(&msg.task_id).cloned() else {
            tracing::trace!(task_id = %msg.task_id, event = %msg.event, "message for unknown task dropped");
            return;
        };

        match &*msg.event {
            COMPLETED_EVENT => self.complete(handle),
            FAILED_EVENT => {
                let reason = msg
                    .args
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or("unknown failure");
                tracing::debug!(task = handle.name(), reason, "task failed");
                self.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(handle.name_arc())
                        .with_task_id(handle.id())
                        .with_reason(reason),
                );
                self.route(handle, msg);
            }
            _ => self.route(handle, msg),
        }
    }

    fn route(&mut self, task: TaskHandle, msg: Message) {
        let key = RouteKey::new(task.id(), msg.event);
        let delivery = Delivery {
            task,
            args: msg.args,
        };

        let report = self.routes.emit(&key, &delivery);
        for message in report.panicked {
            tracing::warn!(task = delivery.task.name(), event = %key.event, panic = %message, "callback panicked");
            self.publish(
                Event::new(EventKind::CallbackPanicked)
                    .with_task(delivery.task.name_arc())
                    .with_task_id(delivery.task.id())
                    .with_reason(format!("event={} panic={}", key.event, message)),
            );
        }
    }

    fn complete(&mut self, handle: TaskHandle) {
        let id = handle.id();
        let Some(entry) = self.registry.remove(&id) else {
            return;
        };
        handle.mark_reaped();
        if let Some(join) = entry.join {
            self.registry.park(handle.name_arc(), join);
        }
        self.routes.retain(|key| key.task != id);

        let running = self.registry.running_len();
        tracing::debug!(task = handle.name(), state = ?handle.state(), running, "task completed");
        self.publish(
            Event::new(EventKind::TaskCompleted)
                .with_task(handle.name_arc())
                .with_task_id(id)
                .with_running(running),
        );
        self.promote();
    }

    /// Starts queued tasks while slots are free.
    fn promote(&mut self) {
        if self.runtime_token.is_cancelled() {
            return;
        }
        while self.registry.running_len() < self.cfg.max_concurrent {
            let Some(spec) = self.registry.dequeue() else {
                break;
            };
            self.start(spec);
        }
    }

    fn start(&mut self, spec: TaskSpec) {
        let (task, handle) = spec.into_parts();
        handle.set_state(TaskState::Running);

        let running = self.registry.running_len() + 1;
        tracing::debug!(task = handle.name(), running, "starting task");
        self.publish(
            Event::new(EventKind::TaskStarting)
                .with_task(handle.name_arc())
                .with_task_id(handle.id())
                .with_running(running),
        );

        let ctx = TaskContext::new(
            handle.clone(),
            self.inbound.sender(),
            self.runtime_token.child_token(),
        );
        let join = match worker::spawn(&self.cfg, task, ctx.clone()) {
            Ok(join) => Some(join),
            Err(err) => {
                tracing::error!(task = handle.name(), error = %err, "failed to spawn worker thread");
                worker::abort(
                    &ctx,
                    &TaskError::Spawn {
                        reason: err.to_string(),
                    },
                );
                None
            }
        };

        // Daemon threads are detached.
        let join = join.filter(|_| !handle.is_daemon());
        self.registry.insert(Entry { handle, join });
    }

    fn publish(&self, event: Event) {
        self.subs.emit(&event);
    }
}

/// Cancels every task and joins the non-daemon threads still tracked.
///
/// Blocks until those tasks return; threads reported by a `GraceExceeded`
/// shutdown were already detached.
impl Drop for TaskManager {
    fn drop(&mut self) {
        self.runtime_token.cancel();
        if self.registry.has_non_daemon() {
            tracing::debug!(tasks = ?self.registry.non_daemon_names(), "waiting for non-daemon tasks");
        }
        self.registry.join_all();
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("max_concurrent", &self.cfg.max_concurrent)
            .field("running", &self.registry.running_len())
            .field("pending", &self.registry.pending_len())
            .field("routes", &self.routes.len())
            .field("subscribers", &self.subs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::{Mutex, mpsc};
    use std::time::Duration;

    use crate::tasks::TaskFn;

    fn manager(max: usize) -> TaskManager {
        TaskManager::new(ManagerConfig::with_max_concurrent(max)).expect("valid config")
    }

    /// Task that blocks until the returned sender is dropped or written to.
    fn gated(name: &'static str) -> (TaskSpec, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel::<()>();
        let rx = Mutex::new(rx);
        let spec = TaskSpec::new(TaskFn::arc(name, move |_ctx: &TaskContext| -> Result<(), TaskError> {
            let _ = rx.lock().unwrap().recv();
            Ok(())
        }));
        (spec, tx)
    }

    fn drain_until(m: &mut TaskManager, mut done: impl FnMut(&TaskManager) -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !done(m) {
            assert!(std::time::Instant::now() < deadline, "timed out");
            m.drain();
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = TaskManager::new(ManagerConfig::with_max_concurrent(0)).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConcurrency { max_concurrent: 0 }));
    }

    #[test]
    fn drain_on_empty_channel_is_noop() {
        let mut m = manager(1);
        assert_eq!(m.drain(), 0);
        assert!(m.is_idle());
    }

    #[test]
    fn queues_beyond_capacity_and_promotes() {
        let mut m = manager(1);
        let (first, release_first) = gated("first");
        let (second, release_second) = gated("second");

        let h1 = m.add(first);
        let h2 = m.add(second);
        assert_eq!((m.running(), m.pending()), (1, 1));
        assert_eq!(h1.state(), TaskState::Running);
        assert_eq!(m.state(h2.id()), Some(TaskState::Created));

        release_first.send(()).unwrap();
        drain_until(&mut m, |m| m.pending() == 0);
        assert_eq!(h2.state(), TaskState::Running);
        assert!(h1.is_reaped());
        assert_eq!(m.state(h1.id()), None);

        release_second.send(()).unwrap();
        drain_until(&mut m, TaskManager::is_idle);
        assert_eq!(h2.state(), TaskState::Completed);
    }

    #[test]
    fn routes_only_to_matching_task_and_event() {
        let mut m = manager(2);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let spec = TaskSpec::new(TaskFn::arc("emitter", |ctx: &TaskContext| -> Result<(), TaskError> {
            ctx.emit("progress", [json!(1)]);
            ctx.emit("other", [json!(2)]);
            ctx.emit("progress", [json!(3)]);
            Ok(())
        }));
        let handle = spec.handle();

        let sink = Rc::clone(&seen);
        m.on(&handle, "progress", move |task, args| {
            sink.borrow_mut().push((task.name().to_string(), args.to_vec()));
        });
        m.add(spec);

        drain_until(&mut m, TaskManager::is_idle);
        assert_eq!(
            *seen.borrow(),
            vec![
                ("emitter".to_string(), vec![json!(1)]),
                ("emitter".to_string(), vec![json!(3)]),
            ]
        );
        assert!(m.routes.is_empty());
    }

    #[test]
    fn failure_is_routed_and_slot_released() {
        let mut m = manager(1);
        let spec = TaskSpec::new(TaskFn::arc("broken", |_ctx: &TaskContext| -> Result<(), TaskError> {
            Err(TaskError::fail("disk full"))
        }));
        let handle = spec.handle();
        let reasons = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reasons);
        m.on(&handle, FAILED_EVENT, move |_task, args| sink.borrow_mut().push(args[0].clone()));

        m.add(spec);
        drain_until(&mut m, TaskManager::is_idle);

        assert_eq!(*reasons.borrow(), vec![json!("execution failed: disk full")]);
        assert_eq!(handle.state(), TaskState::Failed);
    }

    #[test]
    fn on_after_reaping_is_ignored() {
        let mut m = manager(1);
        let spec = TaskSpec::new(TaskFn::arc("quick", |_ctx: &TaskContext| -> Result<(), TaskError> { Ok(()) }));
        let handle = m.add(spec);
        drain_until(&mut m, TaskManager::is_idle);

        m.on(&handle, "progress", |_task, _args| unreachable!());
        assert!(m.routes.is_empty());
    }

    #[test]
    fn drop_joins_non_daemon_tasks() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let mut m = manager(2);
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let handle = m.add(TaskSpec::new(TaskFn::arc("slow", move |_ctx: &TaskContext| -> Result<(), TaskError> {
            std::thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })));
        assert_eq!(handle.state(), TaskState::Running);

        drop(m);
        assert!(finished.load(Ordering::SeqCst), "non-daemon task outlived its manager");
    }

    #[test]
    fn drop_does_not_wait_for_daemons() {
        let mut m = manager(1);
        let (tx, rx) = mpsc::channel::<()>();
        let rx = Mutex::new(rx);
        m.add(TaskSpec::daemon(TaskFn::arc("daemon", move |_ctx: &TaskContext| -> Result<(), TaskError> {
            let _ = rx.lock().unwrap().recv();
            Ok(())
        })));

        let started = std::time::Instant::now();
        drop(m);
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(tx);
    }

    #[test]
    fn discarding_pending_releases_routes() {
        let mut m = manager(1);
        let (running, release) = gated("running");
        let (queued, _never) = gated("queued");
        let never_added = gated("never-added").0.handle();
        m.add(running);
        let queued = m.add(queued);

        m.on(&queued, "progress", |_task, _args| {});
        m.on(&never_added, "progress", |_task, _args| {});
        assert_eq!(m.routes.len(), 2);

        m.discard_pending();
        assert_eq!(m.pending(), 0);
        assert_eq!(m.routes.subscribers(&RouteKey::new(queued.id(), "progress")), 0);
        assert_eq!(m.routes.subscribers(&RouteKey::new(never_added.id(), "progress")), 1);
        assert_eq!(queued.state(), TaskState::Created);

        release.send(()).unwrap();
    }

    #[tokio::test]
    async fn shutdown_discards_pending_and_waits_for_running() {
        let mut m = manager(1);
        let spec = TaskSpec::new(TaskFn::arc("polite", |ctx: &TaskContext| -> Result<(), TaskError> {
            while !ctx.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }));
        let (queued, _release) = gated("queued");

        let running = m.add(spec);
        let waiting = m.add(queued);

        m.shutdown().await.expect("stops within grace");
        assert_eq!(running.state(), TaskState::Completed);
        assert_eq!(waiting.state(), TaskState::Created);
    }
}
