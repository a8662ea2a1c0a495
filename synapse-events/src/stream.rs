//! The single-consumer, ordered `EventStream`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::event::AgentEvent;

/// The producer side of an [`EventStream`], held by the Agent Loop.
///
/// Cloneable so sub-agents and parallel tool executions can emit onto the
/// same stream; `terminated` is shared so every clone honors "events
/// emitted after termination are discarded" (§4.2 contract (c)).
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<AgentEvent>,
    terminated: Arc<AtomicBool>,
}

impl EventEmitter {
    /// Emit an event. Silently dropped if the stream already terminated, or
    /// if the consumer has gone away.
    pub fn emit(&self, event: AgentEvent) {
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        if event.is_terminal() {
            self.terminated.store(true, Ordering::Release);
        }
        // An unbound send only fails if the receiver dropped; nothing to do
        // but drop the event, since nobody is listening anymore.
        let _ = self.tx.send(event);
    }

    /// Whether a terminal event has already been emitted.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

/// The single consumer side of an [`EventStream`].
///
/// Events emitted before this is polled are buffered in FIFO order by the
/// underlying channel (§4.2 contract (a)).
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<AgentEvent>,
}

impl EventStream {
    /// Create a new stream, returning the producer/consumer pair.
    #[must_use]
    pub fn new() -> (EventEmitter, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            EventEmitter {
                tx,
                terminated: Arc::new(AtomicBool::new(false)),
            },
            Self { rx },
        )
    }

    /// Await the next event. Returns `None` once every [`EventEmitter`]
    /// clone has been dropped and the channel is drained.
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }
}
