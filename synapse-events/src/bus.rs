//! Multi-subscriber overlay onto the event stream.
//!
//! Mirrors the dispatch-and-isolate shape of `layer0`'s `HookRegistry`
//! (call each listener in registration order, never let one listener's
//! failure affect its siblings) but fans a single event out to many
//! listeners instead of short-circuiting a pipeline on the first
//! non-`Continue` action.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::RwLock;

use crate::event::{AgentEvent, EventKind};

/// A subscriber callback. Invoked with the event by value (§4.2: "receive
/// values by value").
pub type Subscriber = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// An opaque handle returned by [`EventBus::subscribe`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

enum Filter {
    Kind(EventKind),
    Wildcard,
}

struct Entry {
    id: SubscriptionId,
    filter: Filter,
    callback: Subscriber,
}

/// Registry of event subscribers, keyed by [`EventKind`] or wildcard.
///
/// A panic inside one subscriber's callback is caught and logged; it never
/// propagates to sibling subscribers or to the publisher.
#[derive(Default)]
pub struct EventBus {
    entries: RwLock<Vec<Entry>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a single event kind.
    pub fn subscribe(
        &self,
        kind: EventKind,
        callback: impl Fn(AgentEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.insert(Filter::Kind(kind), Arc::new(callback))
    }

    /// Subscribe to every event kind.
    pub fn subscribe_all(&self, callback: impl Fn(AgentEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.insert(Filter::Wildcard, Arc::new(callback))
    }

    fn insert(&self, filter: Filter, callback: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed));
        self.entries
            .write()
            .expect("event bus lock poisoned")
            .push(Entry { id, filter, callback });
        id
    }

    /// Deregister a subscriber. No-op if the id is unknown (already removed).
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.entries.write().expect("event bus lock poisoned").retain(|e| e.id != id);
    }

    /// Number of currently-registered subscribers, for testability.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.entries.read().expect("event bus lock poisoned").len()
    }

    /// Remove all subscribers, for testability.
    pub fn reset(&self) {
        self.entries.write().expect("event bus lock poisoned").clear();
    }

    /// Publish an event to every matching subscriber, in registration order.
    ///
    /// Each call is wrapped in `catch_unwind`; a panicking subscriber is
    /// logged via `tracing::warn!` and dispatch continues to the rest.
    pub fn publish(&self, event: &AgentEvent) {
        let kind = event.kind();
        let matching: Vec<Subscriber> = self
            .entries
            .read()
            .expect("event bus lock poisoned")
            .iter()
            .filter(|e| matches!(&e.filter, Filter::Wildcard) || matches!(&e.filter, Filter::Kind(k) if *k == kind))
            .map(|e| e.callback.clone())
            .collect();

        for callback in matching {
            let event = event.clone();
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(event)));
            if let Err(panic) = result {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::warn!(kind = ?kind, %message, "event bus subscriber panicked; continuing dispatch");
            }
        }
    }
}
