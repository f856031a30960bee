//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for observing the manager's lifecycle
//! events. Each subscriber is driven by a dedicated worker loop fed by a bounded
//! queue that is owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching, retries) – they do **not** block
//!   the consumer thread nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, events for that
//!   subscriber are **dropped** (warn).
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use taskrelay::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct Failures(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Failures {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::TaskFailed {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failures" }
//!     fn queue_capacity(&self) -> usize { 512 }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for lifecycle event subscribers.
///
/// Called from a subscriber-dedicated tokio task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are **dropped** (warn).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
