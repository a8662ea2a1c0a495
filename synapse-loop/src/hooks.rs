//! Type erasure for [`ObservabilityHook`] (its RPITIT shape is not
//! dyn-compatible) plus the per-event-point firing helpers `AgentLoop` calls.
//!
//! Distinct from `synapse_hooks::StopHookRegistry`: these hooks run inside
//! every suspension point of a single iteration and may only continue, skip
//! a tool call, or terminate the run. They never append a message.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use synapse_types::{
    CompletionRequest, CompletionResponse, HookAction, HookError, HookEvent, LoopError,
    ObservabilityHook, ToolOutput,
};

type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<HookAction, HookError>> + Send + 'a>>;

trait ErasedHook: Send + Sync {
    fn erased_on_event<'a>(&'a self, event: HookEvent<'a>) -> HookFuture<'a>;
}

impl<H: ObservabilityHook> ErasedHook for H {
    fn erased_on_event<'a>(&'a self, event: HookEvent<'a>) -> HookFuture<'a> {
        Box::pin(self.on_event(event))
    }
}

/// A type-erased [`ObservabilityHook`], stored in `AgentLoop`'s hook list.
#[derive(Clone)]
pub struct BoxedHook(Arc<dyn ErasedHook>);

impl BoxedHook {
    /// Wrap any `ObservabilityHook` into its type-erased form.
    #[must_use]
    pub fn new<H: ObservabilityHook + 'static>(hook: H) -> Self {
        Self(Arc::new(hook))
    }

    async fn fire(&self, event: HookEvent<'_>) -> Result<HookAction, HookError> {
        self.0.erased_on_event(event).await
    }
}

fn terminate(reason: String) -> LoopError {
    LoopError::Hook(HookError::Tripwire { hook: "observability".to_string(), reason })
}

/// Fire `LoopIteration` on every hook; the first `Terminate` aborts the run.
pub(crate) async fn fire_loop_iteration(hooks: &[BoxedHook], turn: usize) -> Result<(), LoopError> {
    for hook in hooks {
        if let HookAction::Terminate { reason } = hook.fire(HookEvent::LoopIteration { turn }).await? {
            return Err(terminate(reason));
        }
    }
    Ok(())
}

/// Fire `PreLlmCall` on every hook.
pub(crate) async fn fire_pre_llm(hooks: &[BoxedHook], request: &CompletionRequest) -> Result<(), LoopError> {
    for hook in hooks {
        if let HookAction::Terminate { reason } = hook.fire(HookEvent::PreLlmCall { request }).await? {
            return Err(terminate(reason));
        }
    }
    Ok(())
}

/// Fire `PostLlmCall` on every hook.
pub(crate) async fn fire_post_llm(hooks: &[BoxedHook], response: &CompletionResponse) -> Result<(), LoopError> {
    for hook in hooks {
        if let HookAction::Terminate { reason } = hook.fire(HookEvent::PostLlmCall { response }).await? {
            return Err(terminate(reason));
        }
    }
    Ok(())
}

/// Fire `PreToolExecution` on every hook. Returns `Some(reason)` from the
/// first `Skip`, short-circuiting the remaining hooks (the call is skipped
/// either way, so there is nothing more to observe).
pub(crate) async fn fire_pre_tool(
    hooks: &[BoxedHook],
    tool_name: &str,
    input: &serde_json::Value,
) -> Result<Option<String>, LoopError> {
    for hook in hooks {
        match hook.fire(HookEvent::PreToolExecution { tool_name, input }).await? {
            HookAction::Terminate { reason } => return Err(terminate(reason)),
            HookAction::Skip { reason } => return Ok(Some(reason)),
            HookAction::Continue => {}
        }
    }
    Ok(None)
}

/// Fire `PostToolExecution` on every hook.
pub(crate) async fn fire_post_tool(
    hooks: &[BoxedHook],
    tool_name: &str,
    output: &ToolOutput,
) -> Result<(), LoopError> {
    for hook in hooks {
        if let HookAction::Terminate { reason } =
            hook.fire(HookEvent::PostToolExecution { tool_name, output }).await?
        {
            return Err(terminate(reason));
        }
    }
    Ok(())
}

/// Fire `ContextCompaction` on every hook.
pub(crate) async fn fire_compaction(
    hooks: &[BoxedHook],
    old_tokens: usize,
    new_tokens: usize,
) -> Result<(), LoopError> {
    for hook in hooks {
        if let HookAction::Terminate { reason } =
            hook.fire(HookEvent::ContextCompaction { old_tokens, new_tokens }).await?
        {
            return Err(terminate(reason));
        }
    }
    Ok(())
}

/// Fire `SessionStart` on every hook.
pub(crate) async fn fire_session_start(hooks: &[BoxedHook], session_id: &str) -> Result<(), LoopError> {
    for hook in hooks {
        if let HookAction::Terminate { reason } = hook.fire(HookEvent::SessionStart { session_id }).await? {
            return Err(terminate(reason));
        }
    }
    Ok(())
}

/// Fire `SessionEnd` on every hook. Errors are logged, not propagated — the
/// run has already produced its result by the time this fires.
pub(crate) async fn fire_session_end(hooks: &[BoxedHook], session_id: &str) {
    for hook in hooks {
        if let Err(error) = hook.fire(HookEvent::SessionEnd { session_id }).await {
            tracing::warn!(%error, "observability hook failed on session end");
        }
    }
}
