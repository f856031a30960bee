//! # Reactor: drives a [`TaskManager`] from an async host loop.
//!
//! The reactor pairs the manager with its [`Readiness`] handle so the host only
//! has to await one future per turn. It never moves the manager to another
//! thread: everything runs on the task that awaits it.
//!
//! ## Flow
//! ```text
//! run():
//!   select! {
//!     OS signal (SIGINT/SIGTERM/SIGQUIT, Ctrl-C) ──┐
//!     run_until_idle():                            │
//!       loop { drain; idle? → break; wait }  ──────┤
//!   }                                              ▼
//!                                       manager.shutdown()
//! ```

use crate::core::{inbound::Readiness, manager::TaskManager, shutdown};
use crate::error::RuntimeError;

/// Async adapter around a [`TaskManager`].
///
/// ## Example
/// ```rust
/// use taskrelay::{ManagerConfig, Reactor, TaskContext, TaskError, TaskFn, TaskManager, TaskSpec};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), taskrelay::RuntimeError> {
/// let mut reactor = Reactor::new(TaskManager::new(ManagerConfig::default())?);
/// reactor
///     .manager()
///     .add(TaskSpec::new(TaskFn::arc("once", |_ctx: &TaskContext| Ok::<_, TaskError>(()))));
///
/// reactor.run_until_idle().await;
/// assert!(reactor.manager().is_idle());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Reactor {
    manager: TaskManager,
    readiness: Readiness,
}

impl Reactor {
    /// Wraps `manager`.
    pub fn new(manager: TaskManager) -> Self {
        let readiness = manager.readiness();
        Self { manager, readiness }
    }

    /// Access for `add`/`on` between turns.
    pub fn manager(&mut self) -> &mut TaskManager {
        &mut self.manager
    }

    /// Waits for readiness once, then drains. Returns the number of messages processed.
    pub async fn turn(&mut self) -> usize {
        self.readiness.wait().await;
        self.manager.drain()
    }

    /// Drains until no task is running or queued.
    pub async fn run_until_idle(&mut self) {
        loop {
            self.manager.drain();
            if self.manager.is_idle() {
                return;
            }
            self.readiness.wait().await;
        }
    }

    /// Drains until idle or until the process receives a termination signal,
    /// then shuts the manager down.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        tokio::select! {
            _ = termination() => {
                tracing::info!("termination signal received");
            }
            _ = self.run_until_idle() => {}
        }
        self.manager.shutdown().await
    }

    /// Returns the wrapped manager.
    pub fn into_inner(self) -> TaskManager {
        self.manager
    }
}

/// Resolves on an OS termination signal; never resolves if handlers cannot be installed.
async fn termination() {
    if let Err(err) = shutdown::wait_for_shutdown_signal().await {
        tracing::warn!(error = %err, "cannot install signal handlers");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ManagerConfig;
    use crate::error::TaskError;
    use crate::tasks::{TaskContext, TaskFn, TaskSpec};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[tokio::test]
    async fn turn_processes_posted_messages() {
        let mut reactor = Reactor::new(TaskManager::new(ManagerConfig::default()).unwrap());
        let spec = TaskSpec::new(TaskFn::arc("ping", |ctx: &TaskContext| -> Result<(), TaskError> {
            ctx.emit("ping", [json!(true)]);
            Ok(())
        }));
        let handle = spec.handle();
        let pings = Rc::new(Cell::new(0));
        let counter = Rc::clone(&pings);
        reactor.manager().on(&handle, "ping", move |_task, _args| counter.set(counter.get() + 1));
        reactor.manager().add(spec);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !reactor.manager().is_idle() {
                reactor.turn().await;
            }
        })
        .await
        .expect("task finishes");
        assert_eq!(pings.get(), 1);
    }

    #[tokio::test]
    async fn run_shuts_down_once_idle() {
        let mut reactor = Reactor::new(TaskManager::new(ManagerConfig::default()).unwrap());
        for name in ["a", "b", "c"] {
            reactor
                .manager()
                .add(TaskSpec::new(TaskFn::arc(name, |_ctx: &TaskContext| -> Result<(), TaskError> { Ok(()) })));
        }

        tokio::time::timeout(Duration::from_secs(5), reactor.run())
            .await
            .expect("run returns when idle")
            .expect("clean shutdown");
    }
}
