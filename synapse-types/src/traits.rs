//! Async trait contracts for the agent execution core.
//!
//! `Provider`, `ObservabilityHook`, and `DurableContext` use
//! return-position `impl Trait in trait` (RPITIT) rather than
//! `#[async_trait]`: no heap allocation per call, at the cost of not being
//! object-safe. Callers that need a trait object (the loop's hook list, the
//! durable-context slot) wrap the concrete type in a small hand-written
//! eraser (see `synapse-loop`). `ToolDyn` and `StopHook`, by contrast, are
//! used directly as trait objects (a registry of heterogeneous tools, an
//! ordered list of stop-hooks), so they stay `#[async_trait]`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::{DurableError, HookError, ToolError};
use crate::types::{
    CompletionRequest, CompletionResponse, Message, ToolContext, ToolDefinition, ToolOutput,
};
use crate::wasm::{WasmCompatSend, WasmCompatSync};
use crate::stream::StreamHandle;

/// An LLM backend.
///
/// Not object-safe: callers generic over `P: Provider` monomorphize: the
/// Agent Loop (`synapse-loop`) is `AgentLoop<P: Provider>`.
pub trait Provider: WasmCompatSend + WasmCompatSync {
    /// Run a single completion to exhaustion (no partial output).
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, crate::error::ProviderError>> + WasmCompatSend;

    /// Run a streamed completion, returning a handle to the event channel.
    fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<StreamHandle, crate::error::ProviderError>> + WasmCompatSend;
}

/// A tool invocable by the model, stored as a trait object in a registry.
///
/// Kept `#[async_trait]` (rather than RPITIT) because `ToolRegistry` stores
/// a heterogeneous `Vec<Box<dyn ToolDyn>>`.
#[async_trait]
pub trait ToolDyn: WasmCompatSend + WasmCompatSync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// The tool's definition (description + JSON Schema), sent to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool against validated input.
    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

/// A point in the agent loop's execution an [`ObservabilityHook`] can
/// observe or veto.
#[non_exhaustive]
pub enum HookEvent<'a> {
    /// The loop is about to start a new turn.
    LoopIteration {
        /// The turn number, zero-indexed.
        turn: usize,
    },
    /// About to call the provider.
    PreLlmCall {
        /// The request about to be sent.
        request: &'a CompletionRequest,
    },
    /// The provider has returned.
    PostLlmCall {
        /// The response received.
        response: &'a CompletionResponse,
    },
    /// About to execute a tool call.
    PreToolExecution {
        /// The tool's name.
        tool_name: &'a str,
        /// The tool's input.
        input: &'a serde_json::Value,
    },
    /// A tool call has completed.
    PostToolExecution {
        /// The tool's name.
        tool_name: &'a str,
        /// The tool's output.
        output: &'a ToolOutput,
    },
    /// Context compaction ran.
    ContextCompaction {
        /// Estimated token count before compaction.
        old_tokens: usize,
        /// Estimated token count after compaction.
        new_tokens: usize,
    },
    /// A session started.
    SessionStart {
        /// The session's identifier.
        session_id: &'a str,
    },
    /// A session ended.
    SessionEnd {
        /// The session's identifier.
        session_id: &'a str,
    },
}

/// What a hook wants the loop to do after observing an event.
#[derive(Debug, Clone)]
pub enum HookAction {
    /// Proceed normally.
    Continue,
    /// Skip this tool call; respond with an error tool result carrying `reason`.
    /// Only meaningful for `PreToolExecution`.
    Skip {
        /// Why the call was skipped.
        reason: String,
    },
    /// Abort the run immediately with `reason`.
    Terminate {
        /// Why the run is being terminated.
        reason: String,
    },
}

/// A passive or advisory observer of loop execution (logging, guardrails,
/// metrics). Distinct from [`StopHook`], which is the only hook family
/// allowed to append a message to the transcript.
pub trait ObservabilityHook: WasmCompatSend + WasmCompatSync {
    /// React to an event, returning the action the loop should take.
    fn on_event(
        &self,
        event: HookEvent<'_>,
    ) -> impl Future<Output = Result<HookAction, HookError>> + WasmCompatSend;
}

/// What a [`StopHook`] sees: the run just ended normally.
pub struct StopHookContext<'a> {
    /// The session the run belongs to.
    pub session_id: &'a str,
    /// Full message history at the point the run stopped.
    pub messages: &'a [Message],
    /// The final assistant response text.
    pub final_response: &'a str,
    /// Callback a hook may use to report incremental progress while it runs.
    pub on_progress: &'a (dyn Fn(&str) + Send + Sync),
}

/// What a [`StopHook`] returns after inspecting a completed run.
#[derive(Debug, Clone, Default)]
pub struct StopHookOutcome {
    /// If present, appended to the conversation as a new assistant message.
    pub message: Option<Message>,
    /// If present, surfaced on the event bus rather than the conversation.
    pub data: Option<serde_json::Value>,
}

/// A hook run once, in registration order, after the model ends a run
/// normally (no pending tool calls).
///
/// Object-safe by design: the Stop-Hook pipeline runs an ordered
/// `Vec<Arc<dyn StopHook>>`, and only this family may inject a message —
/// [`ObservabilityHook`]s may only continue, skip, or terminate.
#[async_trait]
pub trait StopHook: WasmCompatSend + WasmCompatSync {
    /// This hook's name, used in logs and surfaced alongside its `data`.
    fn name(&self) -> &str;

    /// Inspect the completed run, optionally returning a message to append
    /// and/or data to surface on the event bus.
    async fn run(&self, ctx: StopHookContext<'_>) -> Result<StopHookOutcome, HookError>;
}

/// Options governing a single durably-executed activity (LLM call or tool
/// execution).
#[derive(Debug, Clone)]
pub struct ActivityOptions {
    /// Maximum wall-clock time before the activity is considered failed.
    pub start_to_close_timeout: Duration,
    /// Maximum time between heartbeats before the activity is considered
    /// stalled, if the underlying engine supports heartbeating.
    pub heartbeat_timeout: Option<Duration>,
    /// Retry policy, if the engine should retry failed activities itself.
    pub retry_policy: Option<RetryPolicy>,
}

/// A retry policy for a durably-executed activity.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial backoff between attempts.
    pub initial_interval: Duration,
    /// Multiplier applied to the backoff after each attempt.
    pub backoff_coefficient: f64,
}

/// Converts a turn's [`crate::types::TokenUsage`] into a dollar cost.
///
/// Object-safe and synchronous: pricing is a pure lookup, never an I/O call.
/// Stored as `Arc<dyn Pricing>` wherever a session store needs to cost a
/// turn (see `synapse-session::FsSessionStore::with_pricing`).
pub trait Pricing: WasmCompatSend + WasmCompatSync {
    /// Returns the cost of `usage` against `model`, or `None` if this
    /// pricing table has no rate for that model.
    fn calculate_cost(&self, usage: &crate::types::TokenUsage, model: &str) -> Option<rust_decimal::Decimal>;
}

/// The default [`Pricing`]: no rate table, so cost is always absent rather
/// than silently reported as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPricing;

impl Pricing for NullPricing {
    fn calculate_cost(&self, _usage: &crate::types::TokenUsage, _model: &str) -> Option<rust_decimal::Decimal> {
        None
    }
}

/// A durable-execution boundary: LLM calls and tool executions routed
/// through this are journaled and replayable by engines like Temporal or
/// Restate. Optional — the Agent Loop runs fine without one.
pub trait DurableContext: WasmCompatSend + WasmCompatSync {
    /// Execute an LLM call as a durable activity.
    fn execute_llm_call(
        &self,
        request: CompletionRequest,
        options: ActivityOptions,
    ) -> impl Future<Output = Result<CompletionResponse, DurableError>> + WasmCompatSend;

    /// Execute a tool call as a durable activity.
    fn execute_tool(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
        options: ActivityOptions,
    ) -> impl Future<Output = Result<ToolOutput, DurableError>> + WasmCompatSend;

    /// Wait for an externally-delivered signal, or `None` on timeout.
    fn wait_for_signal<T: DeserializeOwned + WasmCompatSend>(
        &self,
        signal_name: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<T>, DurableError>> + WasmCompatSend;

    /// Whether the engine recommends continuing as a fresh workflow history
    /// (to bound replay cost) rather than looping further in this one.
    fn should_continue_as_new(&self) -> bool;

    /// Checkpoint `state` and restart as a new workflow history.
    fn continue_as_new(
        &self,
        state: serde_json::Value,
    ) -> impl Future<Output = Result<(), DurableError>> + WasmCompatSend;

    /// Durable sleep: replays as a no-op instead of re-sleeping.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + WasmCompatSend;

    /// The engine's notion of "now", stable across replay.
    fn now(&self) -> DateTime<Utc>;
}
