//! # taskrelay
//!
//! **Taskrelay** runs blocking background work on a bounded pool of OS threads and
//! relays the events those tasks emit back to a single consumer thread (a UI or
//! event-loop thread), where user callbacks run.
//!
//! It is designed as the plumbing between long-running work and a host whose
//! state may only be touched from one thread.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   TaskSpec   │   │   TaskSpec   │   │   TaskSpec   │
//!     │(user task #1)│   │(user task #2)│   │(user task #3)│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ add()            ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskManager (owned by the consumer thread)                       │
//! │  - Registry (running slots ≤ max_concurrent, pending FIFO)        │
//! │  - EventBus<RouteKey, _> (callbacks registered with on())         │
//! │  - SubscriberSet (lifecycle events to observers)                  │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼ spawn            ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ worker thread│   │ worker thread│   │ worker thread│
//!     │  task.run()  │   │  task.run()  │   │  task.run()  │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ ctx.emit(..)     │ __failed         │ __completed
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │              Inbound channel (unbounded mpsc + Notify)            │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                      Readiness::wait() ──► drain()
//!                                   │        (consumer thread)
//!                  ┌────────────────┼─────────────────┐
//!                  ▼                ▼                 ▼
//!           on() callbacks    slot release +     lifecycle Event
//!           (task, event)     promote pending    → Subscribe observers
//! ```
//!
//! ### Lifecycle
//! ```text
//! TaskSpec::new ──► Created ──add()──► Running ──run() Ok────────► __completed ──► Completed
//!                      │                  │
//!                      │ (pool full)      └──run() Err / panic ──► __failed, __completed ──► Failed
//!                      ▼
//!                   pending ──(slot freed while draining)──► Running
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                             |
//! |-------------------|----------------------------------------------------------------|------------------------------------------------|
//! | **Pool**          | Bounded concurrency, FIFO queueing, consumer-thread delivery.  | [`TaskManager`], [`ManagerConfig`]             |
//! | **Host loop**     | Await readiness, drain, graceful shutdown on OS signals.       | [`Readiness`], [`Reactor`]                     |
//! | **Tasks**         | Blocking units of work, as functions or trait impls.           | [`Task`], [`TaskFn`], [`TaskSpec`], [`TaskContext`] |
//! | **Routing**       | Ordered, panic-isolated synchronous callbacks.                 | [`EventBus`], [`RouteKey`]                     |
//! | **Subscriber API**| Observe lifecycle events (logging, metrics, custom).           | [`Subscribe`], [`Event`]                       |
//! | **Errors**        | Typed errors for the manager and for task execution.           | [`RuntimeError`], [`TaskError`]                |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders lifecycle events with `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use taskrelay::{ManagerConfig, Reactor, TaskContext, TaskError, TaskFn, TaskManager, TaskSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ManagerConfig::default();
//!     cfg.max_concurrent = 2;
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn taskrelay::Subscribe>> = vec![Arc::new(taskrelay::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn taskrelay::Subscribe>> = Vec::new();
//!
//!     let manager = TaskManager::builder(cfg).with_subscribers(subs).build()?;
//!     let mut reactor = Reactor::new(manager);
//!
//!     // A daemon task that reports progress; shutdown never waits for it.
//!     let spec = TaskSpec::daemon(TaskFn::arc("download", |ctx: &TaskContext| {
//!         for pct in [0, 50, 100] {
//!             ctx.emit("progress", [json!(pct)]);
//!         }
//!         Ok::<_, TaskError>(())
//!     }));
//!     let handle = reactor.manager().add(spec);
//!     reactor.manager().on(&handle, "progress", |task, args| {
//!         println!("{} at {}%", task.name(), args[0]);
//!     });
//!
//!     // Drain on this thread until idle (or Ctrl-C), then shut down.
//!     reactor.run().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{DEFAULT_MAX_CONCURRENT, ManagerConfig, Reactor, Readiness, TaskManager, TaskManagerBuilder};
pub use error::{RuntimeError, TaskError};
pub use events::{Callback, EmitReport, Event, EventBus, EventKind, RouteKey};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    COMPLETED_EVENT, FAILED_EVENT, Task, TaskContext, TaskFn, TaskHandle, TaskId, TaskRef, TaskSpec, TaskState,
    is_reserved,
};

// Optional: expose a built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
