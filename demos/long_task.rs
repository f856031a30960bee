//! Long-running tasks driven from a UI event loop.
//!
//! A fake UI sends actions over a channel. `start-long-task` submits a daemon
//! `LongTask` that emits `started`, 100 × `progress` and `complete`; the callbacks
//! forward them to the page (here: a log line) on the loop thread.
//!
//! Run with:
//! ```text
//! RUST_LOG=debug cargo run --example long_task --features logging
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use taskrelay::{
    LogWriter, ManagerConfig, Subscribe, Task, TaskContext, TaskError, TaskHandle, TaskManager, TaskSpec,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const STEPS: u64 = 100;

/// Messages the page can send to the application.
#[derive(Debug)]
enum UiAction {
    GetHostname,
    StartLongTask,
    Close,
}

/// Stand-in for the page side: counts and logs what it receives.
#[derive(Default)]
struct Page {
    received: Cell<usize>,
}

impl Page {
    fn emit(&self, name: &str, args: &[Value]) {
        self.received.set(self.received.get() + 1);
        let args = Value::from(args.to_vec());
        tracing::info!(target: "page", event = name, %args);
    }
}

struct LongTask {
    delay: Duration,
}

impl Task for LongTask {
    fn name(&self) -> &str {
        "long-task"
    }

    fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let id = ctx.id().to_string();
        ctx.emit("started", [json!(id), json!(unix_now())]);

        for i in 0..STEPS {
            if ctx.is_cancelled() {
                return Err(TaskError::fail("cancelled"));
            }
            thread::sleep(self.delay);
            ctx.emit("progress", [json!(id), json!(i)]);
        }

        ctx.emit("complete", [json!(id), json!(unix_now())]);
        Ok(())
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn start_long_task(manager: &mut TaskManager, page: &Rc<Page>, n: u64) -> TaskHandle {
    // 5..50ms per step, different for every task.
    let delay = Duration::from_millis(5 + (n * 17) % 45);
    let handle = manager.add(TaskSpec::daemon(Arc::new(LongTask { delay })));

    let p = Rc::clone(page);
    manager.on(&handle, "progress", move |_task, args| {
        p.emit("long-task-progress", args);
    });
    let p = Rc::clone(page);
    manager.on(&handle, "complete", move |task, args| {
        tracing::info!(task = %task.id(), "long task finished");
        p.emit("long-task-complete", args);
    });
    handle
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let mut cfg = ManagerConfig::with_max_concurrent(2);
    cfg.grace = Duration::from_secs(5);
    let mut manager = TaskManager::builder(cfg).with_subscribers(subs).build()?;
    let ready = manager.readiness();
    let page = Rc::new(Page::default());

    // The "page": asks for the hostname, starts three tasks, and closes once they are done.
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiAction>();
    ui_tx.send(UiAction::GetHostname)?;
    for _ in 0..3 {
        ui_tx.send(UiAction::StartLongTask)?;
    }

    let mut started = 0;
    loop {
        tokio::select! {
            Some(action) = ui_rx.recv() => match action {
                UiAction::GetHostname => {
                    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into());
                    page.emit("update-config", &[json!(host)]);
                }
                UiAction::StartLongTask => {
                    started += 1;
                    start_long_task(&mut manager, &page, started);
                }
                UiAction::Close => break,
            },
            _ = ready.wait() => {
                manager.drain();
                if manager.is_idle() {
                    ui_tx.send(UiAction::Close)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    manager.shutdown().await?;
    tracing::info!(events = page.received.get(), "page received");
    Ok(())
}
