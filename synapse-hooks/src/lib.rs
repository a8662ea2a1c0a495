#![deny(missing_docs)]
//! The Stop-Hook pipeline: an ordered set of post-run hooks invoked once the
//! model has ended a run normally (no pending tool calls).
//!
//! Distinct from `synapse_types::ObservabilityHook`, which observes
//! mid-loop and may only continue, skip, or terminate. Stop hooks are the
//! only hook family permitted to append a message to the transcript, and
//! they run exactly once, after the run is already over.

use std::sync::Arc;
use std::time::Duration;

use synapse_events::{AgentEvent, EventBus};
use synapse_types::{HookError, Message, StopHook, StopHookContext, StopHookOutcome};

/// Default wall-clock budget for a single hook, matching
/// `SYNAPSE_SKILL_SUBAGENT_TIMEOUT`'s documented default.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Outcome of running the full pipeline once.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    /// Messages to append to the conversation, in hook registration order.
    pub messages: Vec<Message>,
}

/// An ordered registry of stop hooks, run in sequence when a run ends
/// normally.
///
/// A hook's own error (including timing out) is logged via
/// `tracing::warn!` and otherwise ignored — it does not stop the remaining
/// hooks from running, and it produces neither a message nor event-bus
/// data for that hook.
#[derive(Clone, Default)]
pub struct StopHookRegistry {
    hooks: Vec<Arc<dyn StopHook>>,
    timeout: Duration,
}

impl StopHookRegistry {
    /// An empty registry using the default per-hook timeout.
    #[must_use]
    pub fn new() -> Self {
        Self { hooks: Vec::new(), timeout: DEFAULT_HOOK_TIMEOUT }
    }

    /// Override the per-hook timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a hook. Hooks run in registration order.
    pub fn register(&mut self, hook: Arc<dyn StopHook>) {
        self.hooks.push(hook);
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in order against the same completed run. A hook's
    /// returned `message` is collected in order; its `data` (if any) is
    /// published on `bus` as `AgentEvent::StopHook` immediately.
    pub async fn run_all(
        &self,
        session_id: &str,
        messages: &[Message],
        final_response: &str,
        bus: &EventBus,
        on_progress: &(dyn Fn(&str) + Send + Sync),
    ) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();

        for hook in &self.hooks {
            let ctx = StopHookContext { session_id, messages, final_response, on_progress };
            match self.run_one(hook.as_ref(), ctx).await {
                Ok(StopHookOutcome { message, data }) => {
                    if let Some(message) = message {
                        outcome.messages.push(message);
                    }
                    if data.is_some() {
                        bus.publish(&AgentEvent::StopHook { name: hook.name().to_string(), data });
                    }
                }
                Err(error) => {
                    tracing::warn!(hook = hook.name(), %error, "stop hook failed; continuing pipeline");
                }
            }
        }

        outcome
    }

    async fn run_one(
        &self,
        hook: &dyn StopHook,
        ctx: StopHookContext<'_>,
    ) -> Result<StopHookOutcome, HookError> {
        match tokio::time::timeout(self.timeout, hook.run(ctx)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(HookError::Timeout { hook: hook.name().to_string() }),
        }
    }
}
