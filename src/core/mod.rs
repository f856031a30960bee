//! Runtime core: pool management and consumer-thread delivery.
//!
//! The public API from this module is [`TaskManager`] (with its builder and
//! config) and the [`Reactor`]/[`Readiness`] pair used by host loops.
//!
//! Internal modules:
//! - [`worker`]: runs one task on its own thread and posts the terminal messages;
//! - [`inbound`]: worker → consumer channel plus the readiness signal;
//! - [`registry`]: running slots and the pending FIFO;
//! - [`manager`]: admission, routing, completion and shutdown;
//! - [`reactor`]: async adapter with OS signal handling;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
pub(crate) mod inbound;
mod manager;
mod reactor;
mod registry;
mod shutdown;
mod worker;

pub use builder::TaskManagerBuilder;
pub use config::{DEFAULT_MAX_CONCURRENT, ManagerConfig};
pub use inbound::Readiness;
pub use manager::TaskManager;
pub use reactor::Reactor;
