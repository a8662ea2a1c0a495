#![deny(missing_docs)]
//! Event stream and event bus for the agent execution core.
//!
//! [`EventStream`] is the single-consumer, ordered sequence of
//! [`AgentEvent`]s a caller awaits for one run. [`EventBus`] is a separate
//! multi-subscriber overlay for cross-cutting observers that don't own the
//! run.

mod bus;
mod event;
mod stream;

pub use bus::{EventBus, Subscriber, SubscriptionId};
pub use event::{AgentEvent, ContextAction, EventKind};
pub use stream::{EventEmitter, EventStream};
