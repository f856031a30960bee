//! # Lifecycle event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the optional built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! TaskManager (consumer thread)
//!     add / drain / shutdown ── Event ──► SubscriberSet::emit
//!                                              │
//!                                   ┌──────────┼──────────┐
//!                                   ▼          ▼          ▼
//!                               LogWriter   Metrics    Custom ...
//! ```
//!
//! Task-scoped events (`progress`, `complete`, ...) do **not** go through here;
//! they are routed to `TaskManager::on` callbacks.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
