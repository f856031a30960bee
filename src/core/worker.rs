//! # Run one task on its own thread.
//!
//! Executes a [`Task`] exactly once and always finishes with the completion marker.
//!
//! ## Message flow
//! ```text
//! Success:
//!   task.run() → Ok(())     → post __completed
//!
//! Failure:
//!   task.run() → Err(e)     → state = Failed → post __failed [msg, label] → post __completed
//!
//! Panic:
//!   task.run() → unwind     → caught → TaskError::Panicked → same as failure
//!
//! Spawn error:
//!   thread::Builder::spawn → Err → abort() on the consumer thread → same as failure
//! ```
//!
//! ## Rules
//! - Always posts **exactly one** `__completed`, and it is the task's last message.
//! - Never lets a panic cross the thread boundary; a failure never strands a slot.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crate::core::config::ManagerConfig;
use crate::error::{TaskError, panic_message};
use crate::tasks::{Task, TaskContext, TaskRef};

/// Starts `task` on a new named thread.
pub(crate) fn spawn(
    cfg: &ManagerConfig,
    task: TaskRef,
    ctx: TaskContext,
) -> io::Result<thread::JoinHandle<()>> {
    let mut builder = thread::Builder::new().name(cfg.thread_name(ctx.name()));
    if let Some(size) = cfg.stack_size {
        builder = builder.stack_size(size);
    }
    builder.spawn(move || run_to_completion(task.as_ref(), &ctx))
}

/// Runs the task body and posts the terminal messages.
pub(crate) fn run_to_completion<T: Task + ?Sized>(task: &T, ctx: &TaskContext) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(ctx)));

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(payload) => Some(TaskError::Panicked {
            reason: panic_message(payload.as_ref()),
        }),
    };

    if let Some(err) = failure {
        abort(ctx, &err);
    } else {
        ctx.complete();
    }
}

/// Reports `err` for a task and releases its slot.
pub(crate) fn abort(ctx: &TaskContext, err: &TaskError) {
    ctx.fail(err);
    ctx.complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inbound::Inbound;
    use crate::tasks::{COMPLETED_EVENT, FAILED_EVENT, TaskFn, TaskHandle, TaskState};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn events(inbound: &mut Inbound) -> Vec<String> {
        std::iter::from_fn(|| inbound.try_next())
            .map(|m| m.event.to_string())
            .collect()
    }

    fn run(task: TaskRef) -> (TaskHandle, Vec<String>) {
        let mut inbound = Inbound::new();
        let handle = TaskHandle::new(task.name(), false);
        handle.set_state(TaskState::Running);
        let ctx = TaskContext::new(handle.clone(), inbound.sender(), CancellationToken::new());
        let join = spawn(&ManagerConfig::default(), task, ctx).expect("spawn");
        join.join().expect("worker never panics");
        (handle, events(&mut inbound))
    }

    #[test]
    fn success_ends_with_completion() {
        let (handle, seen) = run(TaskFn::arc("ok", |ctx: &TaskContext| -> Result<(), TaskError> {
            ctx.emit("progress", [json!(1)]);
            ctx.emit("progress", [json!(2)]);
            Ok(())
        }));
        assert_eq!(seen, vec!["progress", "progress", COMPLETED_EVENT]);
        assert_eq!(handle.state(), TaskState::Running);
    }

    #[test]
    fn error_posts_failure_before_completion() {
        let (handle, seen) = run(TaskFn::arc("err", |_ctx: &TaskContext| -> Result<(), TaskError> {
            Err(TaskError::fail("broken pipe"))
        }));
        assert_eq!(seen, vec![FAILED_EVENT, COMPLETED_EVENT]);
        assert_eq!(handle.state(), TaskState::Failed);
    }

    #[test]
    fn panic_is_contained() {
        let (handle, seen) = run(TaskFn::arc("panics", |_ctx: &TaskContext| -> Result<(), TaskError> {
            panic!("kaboom")
        }));
        assert_eq!(seen, vec![FAILED_EVENT, COMPLETED_EVENT]);
        assert_eq!(handle.state(), TaskState::Failed);
    }

    #[test]
    fn thread_is_named_after_task() {
        let mut inbound = Inbound::new();
        let task: TaskRef = TaskFn::arc("named", |ctx: &TaskContext| -> Result<(), TaskError> {
            let name = thread::current().name().map(str::to_owned);
            ctx.emit("thread", [json!(name)]);
            Ok(())
        });
        let handle = TaskHandle::new(task.name(), false);
        let ctx = TaskContext::new(handle, inbound.sender(), CancellationToken::new());
        spawn(&ManagerConfig::default(), task, ctx)
            .unwrap()
            .join()
            .unwrap();

        let msg = inbound.try_next().unwrap();
        assert_eq!(msg.args[0], json!("taskrelay-named"));
    }
}
