use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use taskrelay::{
    Event, EventKind, FAILED_EVENT, ManagerConfig, RuntimeError, Subscribe, TaskContext, TaskError, TaskFn,
    TaskManager, TaskSpec, TaskState,
};

fn manager(max: usize) -> TaskManager {
    TaskManager::new(ManagerConfig::with_max_concurrent(max)).expect("valid config")
}

/// Drains whenever the manager signals readiness until `done` holds.
async fn drain_until(m: &mut TaskManager, mut done: impl FnMut(&TaskManager) -> bool) {
    let ready = m.readiness();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            m.drain();
            assert!(m.running() <= m.config().max_concurrent);
            if done(m) {
                break;
            }
            ready.wait().await;
        }
    })
    .await
    .expect("condition reached in time");
}

/// A task that blocks until its gate is opened (or dropped).
fn gated(name: &'static str, daemon: bool) -> (TaskSpec, mpsc::Sender<()>) {
    let (tx, rx) = mpsc::channel::<()>();
    let rx = Mutex::new(rx);
    let task = TaskFn::arc(name, move |ctx: &TaskContext| -> Result<(), TaskError> {
        ctx.emit("started", [json!(ctx.name())]);
        let _ = rx.lock().unwrap().recv();
        Ok(())
    });
    let spec = if daemon { TaskSpec::daemon(task) } else { TaskSpec::new(task) };
    (spec, tx)
}

fn recorder() -> (Rc<RefCell<Vec<Value>>>, impl FnMut(&taskrelay::TaskHandle, &[Value]) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |_task: &taskrelay::TaskHandle, args: &[Value]| {
        sink.borrow_mut().push(args.first().cloned().unwrap_or(Value::Null));
    })
}

#[tokio::test]
async fn queued_task_waits_for_drained_completion() {
    let mut m = manager(1);
    let first = TaskSpec::new(TaskFn::arc("first", |ctx: &TaskContext| -> Result<(), TaskError> {
        ctx.emit("progress", [json!(1)]);
        ctx.emit("progress", [json!(2)]);
        Ok(())
    }));
    let second = TaskSpec::new(TaskFn::arc("second", |_ctx: &TaskContext| -> Result<(), TaskError> {
        Ok(())
    }));

    let (progress, cb) = recorder();
    let h1 = m.add(first);
    m.on(&h1, "progress", cb);
    let h2 = m.add(second);

    // The first worker has long finished, but nothing was drained yet.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(h2.state(), TaskState::Created);
    assert_eq!((m.running(), m.pending()), (1, 1));

    drain_until(&mut m, TaskManager::is_idle).await;
    assert_eq!(*progress.borrow(), vec![json!(1), json!(2)]);
    assert_eq!(h1.state(), TaskState::Completed);
    assert_eq!(h2.state(), TaskState::Completed);
}

#[tokio::test]
async fn queued_daemon_starts_only_after_a_completion() {
    let mut m = manager(2);
    let (t1, open1) = gated("t1", true);
    let (t2, open2) = gated("t2", true);
    let (t3, open3) = gated("t3", true);

    let h1 = m.add(t1);
    let h2 = m.add(t2);
    let h3 = m.add(t3);
    assert_eq!(h3.state(), TaskState::Created);

    open1.send(()).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(h3.state(), TaskState::Created, "no start before the completion is drained");
    assert_eq!(m.running(), 2);

    drain_until(&mut m, |_| h3.state() == TaskState::Running).await;
    assert!(h1.is_reaped());
    assert_eq!(h2.state(), TaskState::Running);
    assert_eq!((m.running(), m.pending()), (2, 0));

    open2.send(()).unwrap();
    open3.send(()).unwrap();
    drain_until(&mut m, TaskManager::is_idle).await;
}

#[tokio::test]
async fn late_registration_still_sees_undrained_events() {
    let mut m = manager(1);
    let spec = TaskSpec::new(TaskFn::arc("late", |ctx: &TaskContext| -> Result<(), TaskError> {
        for i in 1..=3 {
            ctx.emit("progress", [json!(i)]);
        }
        Ok(())
    }));

    let handle = m.add(spec);
    std::thread::sleep(Duration::from_millis(50));
    let (progress, cb) = recorder();
    m.on(&handle, "progress", cb);

    drain_until(&mut m, TaskManager::is_idle).await;
    assert_eq!(*progress.borrow(), vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn failing_task_frees_its_slot() {
    let mut m = manager(1);
    let broken = TaskSpec::new(TaskFn::arc("broken", |_ctx: &TaskContext| -> Result<(), TaskError> {
        Err(TaskError::fail("refused"))
    }));
    let panicking = TaskSpec::new(TaskFn::arc("panicking", |_ctx: &TaskContext| -> Result<(), TaskError> {
        panic!("kaboom")
    }));
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let after = TaskSpec::new(TaskFn::arc("after", move |_ctx: &TaskContext| -> Result<(), TaskError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    let (failures, cb) = recorder();
    let hb = m.add(broken);
    m.on(&hb, FAILED_EVENT, cb);
    let hp = m.add(panicking);
    let ha = m.add(after);

    drain_until(&mut m, TaskManager::is_idle).await;
    assert_eq!(*failures.borrow(), vec![json!("execution failed: refused")]);
    assert_eq!(hb.state(), TaskState::Failed);
    assert_eq!(hp.state(), TaskState::Failed);
    assert_eq!(ha.state(), TaskState::Completed);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn queued_tasks_start_in_fifo_order() {
    let mut m = manager(1);
    let (blocker, open) = gated("blocker", false);
    m.add(blocker);

    let order = Arc::new(Mutex::new(Vec::new()));
    let names = ["q1", "q2", "q3", "q4", "q5"];
    for name in names {
        let order = Arc::clone(&order);
        m.add(TaskSpec::new(TaskFn::arc(name, move |ctx: &TaskContext| -> Result<(), TaskError> {
            order.lock().unwrap().push(ctx.name().to_string());
            Ok(())
        })));
    }
    assert_eq!(m.pending(), names.len());

    open.send(()).unwrap();
    drain_until(&mut m, TaskManager::is_idle).await;
    assert_eq!(*order.lock().unwrap(), names);
}

#[tokio::test]
async fn never_runs_more_than_the_limit() {
    const LIMIT: usize = 3;
    let mut m = manager(LIMIT);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for i in 0..20 {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        m.add(TaskSpec::new(TaskFn::arc(format!("busy-{i}"), move |_ctx: &TaskContext| -> Result<(), TaskError> {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })));
        assert!(m.running() <= LIMIT);
    }

    drain_until(&mut m, TaskManager::is_idle).await;
    assert!(peak.load(Ordering::SeqCst) <= LIMIT);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn panicking_callback_does_not_stop_delivery() {
    let lifecycle = Arc::new(Lifecycle::default());
    let mut m = TaskManager::builder(ManagerConfig::default())
        .with_subscribers(vec![lifecycle.clone() as Arc<dyn Subscribe>])
        .build()
        .unwrap();

    let spec = TaskSpec::new(TaskFn::arc("noisy", |ctx: &TaskContext| -> Result<(), TaskError> {
        ctx.emit("progress", [json!(1)]);
        ctx.emit("progress", [json!(2)]);
        Ok(())
    }));
    let handle = spec.handle();
    m.on(&handle, "progress", |_task, args| {
        if args[0] == json!(1) {
            panic!("callback bug");
        }
    });
    let (progress, cb) = recorder();
    m.on(&handle, "progress", cb);
    m.add(spec);

    drain_until(&mut m, TaskManager::is_idle).await;
    assert_eq!(*progress.borrow(), vec![json!(1), json!(2)]);

    m.shutdown().await.unwrap();
    let kinds = lifecycle.kinds();
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::CallbackPanicked).count(), 1);
}

#[tokio::test]
async fn lifecycle_events_reach_subscribers_in_order() {
    let lifecycle = Arc::new(Lifecycle::default());
    let mut m = TaskManager::builder(ManagerConfig::with_max_concurrent(1))
        .with_subscribers(vec![lifecycle.clone() as Arc<dyn Subscribe>])
        .build()
        .unwrap();

    m.add(TaskSpec::new(TaskFn::arc("one", |_ctx: &TaskContext| -> Result<(), TaskError> { Ok(()) })));
    m.add(TaskSpec::new(TaskFn::arc("two", |_ctx: &TaskContext| -> Result<(), TaskError> {
        Err(TaskError::fail("nope"))
    })));
    drain_until(&mut m, TaskManager::is_idle).await;
    m.shutdown().await.unwrap();

    assert_eq!(
        lifecycle.kinds(),
        vec![
            EventKind::TaskStarting,
            EventKind::TaskQueued,
            EventKind::TaskCompleted,
            EventKind::TaskStarting,
            EventKind::TaskFailed,
            EventKind::TaskCompleted,
            EventKind::ShutdownRequested,
            EventKind::AllStoppedWithin,
        ]
    );
}

#[tokio::test]
async fn shutdown_reports_stuck_non_daemon_tasks() {
    let lifecycle = Arc::new(Lifecycle::default());
    let cfg = ManagerConfig {
        max_concurrent: 2,
        grace: Duration::from_millis(100),
        ..Default::default()
    };
    let mut m = TaskManager::builder(cfg)
        .with_subscribers(vec![lifecycle.clone() as Arc<dyn Subscribe>])
        .build()
        .unwrap();

    let (stubborn, open_stubborn) = gated("stubborn", false);
    let (daemon, open_daemon) = gated("background", true);
    let (queued, _open_queued) = gated("never-started", false);
    m.add(stubborn);
    m.add(daemon);
    let hq = m.add(queued);
    assert_eq!(m.pending(), 1);

    let err = tokio::time::timeout(Duration::from_secs(5), m.shutdown())
        .await
        .expect("bounded by grace")
        .unwrap_err();
    match err {
        RuntimeError::GraceExceeded { grace, stuck } => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec!["stubborn".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(hq.state(), TaskState::Created);

    let kinds = lifecycle.kinds();
    assert!(kinds.contains(&EventKind::TaskRemoved));
    assert_eq!(kinds.last(), Some(&EventKind::GraceExceeded));

    drop(open_stubborn);
    drop(open_daemon);
}

#[tokio::test]
async fn shutdown_does_not_wait_for_daemons() {
    let mut cfg = ManagerConfig::default();
    cfg.grace = Duration::from_secs(30);
    let mut m = TaskManager::new(cfg).unwrap();

    let (daemon, open) = gated("daemon", true);
    m.add(daemon);

    tokio::time::timeout(Duration::from_secs(1), m.shutdown())
        .await
        .expect("daemons are not waited on")
        .expect("clean shutdown");
    drop(open);
}

#[tokio::test]
async fn cooperative_tasks_stop_on_shutdown() {
    let mut m = manager(2);
    for name in ["poll-a", "poll-b"] {
        m.add(TaskSpec::new(TaskFn::arc(name, |ctx: &TaskContext| -> Result<(), TaskError> {
            while !ctx.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        })));
    }

    tokio::time::timeout(Duration::from_secs(5), m.shutdown())
        .await
        .expect("bounded")
        .expect("all stopped within grace");
}

#[derive(Default)]
struct Lifecycle {
    seen: Mutex<Vec<EventKind>>,
}

impl Lifecycle {
    fn kinds(&self) -> Vec<EventKind> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Subscribe for Lifecycle {
    async fn on_event(&self, ev: &Event) {
        self.seen.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "lifecycle"
    }
}
