//! # Event routing and lifecycle events.
//!
//! - [`EventBus`]: synchronous named-signal registry used to route task events
//! - [`RouteKey`]: typed `(task id, event name)` key
//! - [`Event`] / [`EventKind`]: lifecycle events delivered to observers

mod bus;
mod event;

pub use bus::{Callback, EmitReport, EventBus, RouteKey};
pub use event::{Event, EventKind};
