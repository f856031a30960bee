//! # Task registry: running slots and the pending queue.
//!
//! The registry is the single source of truth for "is this task still tracked".
//! It is owned by the [`TaskManager`](crate::TaskManager) and only touched on the
//! consumer thread.
//!
//! ## Architecture
//! ```text
//! add(spec) ──► running.len() < max? ──yes──► insert(Entry)          (slot taken)
//!                      │
//!                      no
//!                      ▼
//!               pending.push_back(spec)                             (FIFO)
//!
//! drain: __completed(id) ──► remove(id) ──► park(join) if non-daemon   (slot freed)
//!                                   └──► dequeue() ──► start next
//! ```
//!
//! ## Rules
//! - An entry exists exactly while its task holds a slot
//! - Pending specs are started strictly in insertion order
//! - Daemon tasks have no join handle; non-daemon handles are joined after completion

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::tasks::{TaskHandle, TaskId, TaskSpec};

/// Slot held by a running task.
pub(crate) struct Entry {
    /// Shared identity and state.
    pub(crate) handle: TaskHandle,
    /// Worker thread, kept for non-daemon tasks only.
    pub(crate) join: Option<JoinHandle<()>>,
}

/// Running tasks keyed by id, plus the FIFO of tasks waiting for a slot.
#[derive(Default)]
pub(crate) struct Registry {
    running: HashMap<TaskId, Entry>,
    pending: VecDeque<TaskSpec>,
    /// Non-daemon threads whose completion marker was processed.
    exiting: Vec<(Arc<str>, JoinHandle<()>)>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn running_len(&self) -> usize {
        self.running.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn handle(&self, id: &TaskId) -> Option<&TaskHandle> {
        self.running.get(id).map(|e| &e.handle)
    }

    /// Looks a task up among running and pending tasks.
    pub(crate) fn find(&self, id: &TaskId) -> Option<TaskHandle> {
        self.handle(id).cloned().or_else(|| {
            self.pending
                .iter()
                .find(|spec| spec.id() == *id)
                .map(TaskSpec::handle)
        })
    }

    pub(crate) fn insert(&mut self, entry: Entry) {
        self.running.insert(entry.handle.id(), entry);
    }

    pub(crate) fn remove(&mut self, id: &TaskId) -> Option<Entry> {
        self.running.remove(id)
    }

    pub(crate) fn enqueue(&mut self, spec: TaskSpec) {
        self.pending.push_back(spec);
    }

    pub(crate) fn dequeue(&mut self) -> Option<TaskSpec> {
        self.pending.pop_front()
    }

    /// Empties the pending queue, oldest first.
    pub(crate) fn take_pending(&mut self) -> Vec<TaskSpec> {
        self.pending.drain(..).collect()
    }

    /// Keeps a completed non-daemon thread until it can be joined.
    pub(crate) fn park(&mut self, name: Arc<str>, join: JoinHandle<()>) {
        self.exiting.push((name, join));
    }

    /// Joins parked threads that already returned. Never blocks.
    pub(crate) fn reap_exited(&mut self) {
        let mut i = 0;
        while i < self.exiting.len() {
            if self.exiting[i].1.is_finished() {
                let (name, join) = self.exiting.swap_remove(i);
                if join.join().is_err() {
                    tracing::warn!(task = %name, "worker thread panicked after completion");
                }
            } else {
                i += 1;
            }
        }
    }

    /// Joins every parked thread.
    ///
    /// Parked threads already posted their completion marker, which is their last action.
    pub(crate) fn join_exiting(&mut self) {
        for (name, join) in self.exiting.drain(..) {
            if join.join().is_err() {
                tracing::warn!(task = %name, "worker thread panicked after completion");
            }
        }
    }

    /// Joins every non-daemon thread still tracked, running or parked. Blocks.
    pub(crate) fn join_all(&mut self) {
        for entry in self.running.values_mut() {
            if let Some(join) = entry.join.take() {
                if join.join().is_err() {
                    tracing::warn!(task = entry.handle.name(), "worker thread panicked");
                }
            }
        }
        self.join_exiting();
    }

    /// Drops the join handles of running tasks, leaving their threads detached.
    pub(crate) fn detach_running(&mut self) {
        for entry in self.running.values_mut() {
            if entry.join.take().is_some() {
                tracing::debug!(task = entry.handle.name(), "worker thread detached");
            }
        }
    }

    /// Returns `true` while a non-daemon task holds a slot.
    pub(crate) fn has_non_daemon(&self) -> bool {
        self.running.values().any(|e| e.join.is_some())
    }

    /// Sorted names of non-daemon tasks still holding a slot.
    pub(crate) fn non_daemon_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .running
            .values()
            .filter(|e| e.join.is_some())
            .map(|e| e.handle.name().to_string())
            .collect();
        names.sort_unstable();
        names
    }
}
