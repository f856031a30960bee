use std::sync::Arc;

use crate::{
    core::{config::ManagerConfig, manager::TaskManager},
    error::RuntimeError,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`TaskManager`] with optional lifecycle subscribers.
pub struct TaskManagerBuilder {
    cfg: ManagerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl TaskManagerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ManagerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets lifecycle subscribers for observability.
    ///
    /// Subscribers receive manager events (queueing, starts, failures, shutdown)
    /// through dedicated workers with bounded queues. A non-empty list requires
    /// `build` to be called inside a tokio runtime.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and builds the manager.
    ///
    /// Fails with [`RuntimeError::InvalidConcurrency`] for `max_concurrent = 0`.
    pub fn build(self) -> Result<TaskManager, RuntimeError> {
        self.cfg.validate()?;
        let subs = SubscriberSet::new(self.subscribers);
        Ok(TaskManager::new_internal(self.cfg, subs))
    }
}

impl std::fmt::Debug for TaskManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subscribers.iter().map(|s| s.name()).collect();
        f.debug_struct("TaskManagerBuilder")
            .field("cfg", &self.cfg)
            .field("subscribers", &names)
            .finish()
    }
}
