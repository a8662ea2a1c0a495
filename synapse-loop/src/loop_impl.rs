//! The Agent Loop: drives the dialogue until a final answer is produced or
//! a termination condition fires.
//!
//! Grounded in `neuron-loop::loop_impl`'s `AgentLoop`/`AgentLoopBuilder`
//! shape (hook-erasure via [`crate::hooks::BoxedHook`], the provider/tool/
//! context turn structure) generalized to additionally drive the Message
//! Validator, History Sanitizer, Sliding-Window Failure Detector, Todo
//! Reminder Strategy, and Stop-Hook pipeline this system's algorithm
//! requires.

use std::sync::Arc;

use synapse_context::ContextOrchestrator;
use synapse_events::{AgentEvent, ContextAction, EventBus, EventEmitter};
use synapse_failure_detector::SlidingWindowFailureDetector;
use synapse_sanitizer::sanitize;
use synapse_session::{CreateSessionOptions, SessionStore};
use synapse_todo::{reminder_message, ReminderDecision, TodoReminderStrategy, TodoStore};
use synapse_tool::{FailureCategory, ToolCall, ToolExecutionBridge, ToolMiddleware, ToolRegistry};
use synapse_types::{
    CompletionRequest, ContentBlock, LoopError, Message, ObservabilityHook, Provider, StopReason,
    TokenUsage, ToolContext, ToolOutput,
};
use synapse_validator::validate;
use tokio::sync::Mutex;

use crate::config::LoopConfig;
use crate::hooks::{self, BoxedHook};

/// Why a run stopped, mirroring the reasons the event stream/session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The model produced a tool-less final answer.
    EndTurn,
    /// `max_iterations` was reached before the model stopped.
    MaxIterations,
    /// The Sliding-Window Failure Detector tripped.
    FailureThreshold,
}

/// The outcome of a completed (non-aborted, non-error) run.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// The final text response.
    pub response: String,
    /// Full message history at the point the run stopped, including any
    /// Stop-Hook-appended messages.
    pub messages: Vec<Message>,
    /// Cumulative token usage across every turn.
    pub usage: TokenUsage,
    /// Number of turns completed.
    pub turns: usize,
    /// Why the run stopped.
    pub reason: TerminationReason,
}

/// The agentic while loop: validates, sanitizes, and orchestrates context
/// around a provider/tool-execution turn cycle, with failure detection and
/// todo-reminder nudging layered on top.
///
/// Generic over `P: Provider + Clone` — `Clone` because both the loop
/// itself and its [`ContextOrchestrator`] (used for compact's summarization
/// call) need their own handle to the same backend.
pub struct AgentLoop<P: Provider + Clone> {
    provider: P,
    registry: ToolRegistry,
    bridge: ToolExecutionBridge,
    context: ContextOrchestrator<P>,
    session_store: Arc<dyn SessionStore>,
    session_id: String,
    hooks: Vec<BoxedHook>,
    stop_hooks: synapse_hooks::StopHookRegistry,
    bus: Arc<EventBus>,
    todo_store: Arc<Mutex<TodoStore>>,
    todo_reminder: TodoReminderStrategy,
    failure_detector: SlidingWindowFailureDetector,
    config: LoopConfig,
    messages: Vec<Message>,
    loaded: bool,
}

const SKILL_SEARCH_PREFIX: &str =
    "Before responding, check whether a registered skill already covers this request.\n\n";

impl<P: Provider + Clone> AgentLoop<P> {
    /// Start building a loop over `provider`, persisting to `session_store`.
    #[must_use]
    pub fn builder(provider: P, session_store: Arc<dyn SessionStore>) -> AgentLoopBuilder<P> {
        AgentLoopBuilder {
            provider,
            session_store,
            session_id: None,
            tools: ToolRegistry::new(),
            middleware: Vec::new(),
            hooks: Vec::new(),
            stop_hooks: synapse_hooks::StopHookRegistry::new(),
            bus: Arc::new(EventBus::new()),
            todo_store: Arc::new(Mutex::new(TodoStore::new())),
            config: LoopConfig::default(),
        }
    }

    /// The session this loop is bound to, once loaded (empty until the
    /// first [`Self::run`] call resolves it).
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The event bus this loop publishes Stop-Hook data onto.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The process-wide todo store this loop's `is_primary` reminder logic
    /// observes. Shared with whatever tool implements `todo_write`.
    #[must_use]
    pub fn todo_store(&self) -> &Arc<Mutex<TodoStore>> {
        &self.todo_store
    }

    async fn ensure_loaded(&mut self) -> Result<(), LoopError> {
        if self.loaded {
            return Ok(());
        }
        let mut messages = self.session_store.load_history(&self.session_id).await?.messages;
        if sanitize(&mut messages) {
            self.session_store.rewrite_history(&self.session_id, &messages).await?;
        }
        self.messages = messages;
        self.loaded = true;
        Ok(())
    }

    /// Run the loop to completion on `user_text`, emitting the full event
    /// sequence onto `emitter` and honoring `tool_ctx.cancellation_token`.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for infrastructure failures (provider, session
    /// I/O, context orchestration, a `Terminate`-returning hook) or
    /// cancellation (`LoopError::Aborted`); ordinary run outcomes
    /// (end of turn, iteration exhaustion, failure threshold) are `Ok` with
    /// [`AgentResult::reason`] reporting which.
    pub async fn run(
        &mut self,
        user_text: &str,
        tool_ctx: &ToolContext,
        emitter: &EventEmitter,
    ) -> Result<AgentResult, LoopError> {
        self.ensure_loaded().await?;
        emitter.emit(AgentEvent::AgentStart);
        hooks::fire_session_start(&self.hooks, &self.session_id).await?;

        let text = if self.config.is_primary {
            format!("{SKILL_SEARCH_PREFIX}{user_text}")
        } else {
            user_text.to_string()
        };
        let user_message = Message::user(text);
        self.append(user_message).await?;

        let mut total_usage = TokenUsage::default();
        let mut turn: usize = 0;
        let mut last_model = String::new();

        let (reason, final_text) = loop {
            if tool_ctx.cancellation_token.is_cancelled() {
                return Err(self.abort(emitter, total_usage).await);
            }

            if turn >= self.config.max_iterations {
                let message = Message::assistant(format!(
                    "Reached tool iteration limit ({}); stopping.",
                    self.config.max_iterations
                ));
                let text = message.text();
                self.append(message).await?;
                break (TerminationReason::MaxIterations, text);
            }

            emitter.emit(AgentEvent::TurnStart { turn_index: turn });
            hooks::fire_loop_iteration(&self.hooks, turn).await?;

            self.run_context_orchestration(emitter).await?;

            let request = CompletionRequest {
                model: String::new(),
                messages: self.messages.clone(),
                system: Some(self.config.system_prompt.clone()),
                tools: self.registry.definitions(),
                ..Default::default()
            };
            hooks::fire_pre_llm(&self.hooks, &request).await?;

            emitter.emit(AgentEvent::MessageStart);
            let response = tokio::select! {
                biased;
                () = tool_ctx.cancellation_token.cancelled() => {
                    return Err(self.abort(emitter, total_usage).await);
                }
                result = self.provider.complete(request) => result?,
            };
            emitter.emit(AgentEvent::MessageEnd);
            hooks::fire_post_llm(&self.hooks, &response).await?;

            emitter.emit(AgentEvent::Usage(response.usage));
            total_usage.accumulate(&response.usage);
            last_model = response.model.clone();
            turn += 1;

            let assistant_message = response.message;
            let validation = validate(&assistant_message);
            self.append(assistant_message.clone()).await?;

            if response.stop_reason == StopReason::Compaction {
                emitter.emit(AgentEvent::TurnEnd);
                continue;
            }

            if !assistant_message.has_tool_uses() {
                emitter.emit(AgentEvent::TurnEnd);

                if let Some(text) = self.maybe_remind(emitter).await? {
                    self.append(reminder_message(text)).await?;
                    continue;
                }

                break (TerminationReason::EndTurn, assistant_message.text());
            }

            let result_blocks = match self.execute_turn_tools(&assistant_message, &validation, tool_ctx, emitter).await
            {
                Ok(blocks) => blocks,
                Err(LoopError::Aborted) => return Err(self.abort(emitter, total_usage).await),
                Err(e) => return Err(e),
            };
            self.append(Message::tool_results(result_blocks)).await?;
            emitter.emit(AgentEvent::TurnEnd);

            if self.failure_detector.should_stop() {
                break (TerminationReason::FailureThreshold, assistant_message.text());
            }
        };

        let final_text = self.run_stop_hooks(final_text).await?;

        emitter.emit(AgentEvent::AgentEnd { result: final_text.clone(), usage: total_usage });
        self.session_store.update_usage(&self.session_id, &total_usage, &last_model).await?;
        hooks::fire_session_end(&self.hooks, &self.session_id).await;

        Ok(AgentResult { response: final_text, messages: self.messages.clone(), usage: total_usage, turns: turn, reason })
    }

    /// Emit the terminal event pair and fire the session-end hooks for a
    /// cancelled run. Shared by every suspension point that races the
    /// cancellation token, so an in-flight provider call or tool execution
    /// aborts the same way a pre-iteration cancellation check does.
    async fn abort(&self, emitter: &EventEmitter, usage: TokenUsage) -> LoopError {
        emitter.emit(AgentEvent::Error { error: "aborted".to_string(), recoverable: false });
        emitter.emit(AgentEvent::AgentEnd { result: String::new(), usage });
        hooks::fire_session_end(&self.hooks, &self.session_id).await;
        LoopError::Aborted
    }

    async fn append(&mut self, message: Message) -> Result<(), LoopError> {
        self.session_store.append_messages(&self.session_id, std::slice::from_ref(&message)).await?;
        self.messages.push(message);
        Ok(())
    }

    async fn run_context_orchestration(&mut self, emitter: &EventEmitter) -> Result<(), LoopError> {
        let token_count = self.context.token_estimate(&self.messages);
        if token_count < self.config.context.offload_threshold {
            return Ok(());
        }
        let offload_dir = self.session_store.offload_dir(&self.session_id).await?;
        let stats = self.context.orchestrate_if_needed(self.messages.clone(), &offload_dir).await?;
        if stats.freed_tokens == 0 {
            return Ok(());
        }
        self.messages = stats.messages;
        self.session_store.rewrite_history(&self.session_id, &self.messages).await?;
        let action = if stats.deleted_files.is_empty() { ContextAction::Offload } else { ContextAction::Compact };
        emitter.emit(AgentEvent::ContextManagement {
            action,
            details: format!("freed {} tokens ({} -> {})", stats.freed_tokens, stats.previous_tokens, stats.current_tokens),
        });
        hooks::fire_compaction(&self.hooks, stats.previous_tokens, stats.current_tokens).await
    }

    /// Checks the todo store for the Todo Reminder Strategy, advancing its
    /// staleness counter by comparing the store's contents before and after
    /// this call (the store's mutations happen inside tool handlers, not
    /// here, so "did it change this turn" is observed rather than pushed).
    async fn maybe_remind(&mut self, emitter: &EventEmitter) -> Result<Option<String>, LoopError> {
        if !self.config.is_primary {
            return Ok(None);
        }
        let todo = self.todo_store.lock().await;
        let decision = self.todo_reminder.check(&todo);
        match decision {
            ReminderDecision::Remind { text } => {
                let open_count = todo.open_items().count();
                drop(todo);
                emitter.emit(AgentEvent::TodoReminder { open_count });
                Ok(Some(text))
            }
            ReminderDecision::NoReminder => Ok(None),
        }
    }

    async fn execute_turn_tools(
        &mut self,
        assistant_message: &Message,
        validation: &synapse_validator::ValidationResult,
        tool_ctx: &ToolContext,
        emitter: &EventEmitter,
    ) -> Result<Vec<ContentBlock>, LoopError> {
        let invalid: std::collections::HashMap<&str, &str> =
            validation.errors.iter().map(|e| (e.tool_use_id.as_str(), e.reason.as_str())).collect();

        let tool_uses: Vec<(&str, &str, &serde_json::Value)> = assistant_message.tool_uses().collect();
        let mut slots: Vec<Option<ContentBlock>> = vec![None; tool_uses.len()];
        let mut bridge_calls: Vec<ToolCall> = Vec::new();
        let mut bridge_slots: Vec<usize> = Vec::new();

        for (idx, (id, name, input)) in tool_uses.iter().enumerate() {
            if let Some(reason) = invalid.get(*id) {
                slots[idx] = Some(ContentBlock::tool_error(*id, format!("Invalid tool call: {reason}")));
                continue;
            }
            if let Some(reason) = hooks::fire_pre_tool(&self.hooks, name, input).await? {
                slots[idx] = Some(ContentBlock::tool_error(*id, format!("Tool call skipped: {reason}")));
                continue;
            }
            bridge_calls.push(ToolCall { id: (*id).to_string(), name: (*name).to_string(), input: (*input).clone() });
            bridge_slots.push(idx);
        }

        for call in &bridge_calls {
            emitter.emit(AgentEvent::ToolStart {
                call_id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }

        let executed = tokio::select! {
            biased;
            () = tool_ctx.cancellation_token.cancelled() => return Err(LoopError::Aborted),
            executed = self.bridge.execute(&bridge_calls, tool_ctx, self.config.parallel_tool_execution) => executed,
        };

        for ((call, executed_call), slot) in bridge_calls.iter().zip(executed.iter()).zip(bridge_slots.iter()) {
            let (text, is_error) = match &executed_call.block {
                ContentBlock::ToolResult { content, is_error, .. } => {
                    (content.iter().filter_map(|c| c.as_text()).collect::<Vec<_>>().join("\n"), *is_error)
                }
                _ => (String::new(), false),
            };
            emitter.emit(AgentEvent::ToolEnd { call_id: call.id.clone(), output: text, is_error });

            if let ContentBlock::ToolResult { content, is_error, .. } = &executed_call.block {
                let output = ToolOutput { content: content.clone(), is_error: *is_error, metadata: None };
                hooks::fire_post_tool(&self.hooks, &call.name, &output).await?;
            }

            match executed_call.failure {
                None => self.failure_detector.record(false),
                Some(FailureCategory::Countable) => self.failure_detector.record(true),
                Some(FailureCategory::PermissionDenied | FailureCategory::UserInterrupt) => {}
            }

            slots[*slot] = Some(executed_call.block.clone());
        }

        Ok(slots.into_iter().map(|slot| slot.expect("every tool_use slot filled above")).collect())
    }

    async fn run_stop_hooks(&mut self, final_text: String) -> Result<String, LoopError> {
        if self.stop_hooks.is_empty() {
            return Ok(final_text);
        }
        let on_progress: &(dyn Fn(&str) + Send + Sync) = &|_: &str| {};
        let outcome = self
            .stop_hooks
            .run_all(&self.session_id, &self.messages, &final_text, &self.bus, on_progress)
            .await;
        if !outcome.messages.is_empty() {
            self.session_store.append_messages(&self.session_id, &outcome.messages).await?;
            self.messages.extend(outcome.messages);
        }
        Ok(final_text)
    }
}

/// Builds an [`AgentLoop`]. Only `provider` and `session_store` are
/// required; everything else has a documented default.
pub struct AgentLoopBuilder<P: Provider + Clone> {
    provider: P,
    session_store: Arc<dyn SessionStore>,
    session_id: Option<String>,
    tools: ToolRegistry,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
    hooks: Vec<BoxedHook>,
    stop_hooks: synapse_hooks::StopHookRegistry,
    bus: Arc<EventBus>,
    todo_store: Arc<Mutex<TodoStore>>,
    config: LoopConfig,
}

impl<P: Provider + Clone> AgentLoopBuilder<P> {
    /// Resume an existing session instead of creating a new one on first run.
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the tool registry.
    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Set the tool middleware chain, run in order before the bridge's
    /// dedup/reorder logic.
    #[must_use]
    pub fn middleware(mut self, middleware: Vec<Arc<dyn ToolMiddleware>>) -> Self {
        self.middleware = middleware;
        self
    }

    /// Add an observability hook.
    #[must_use]
    pub fn hook<H: ObservabilityHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(BoxedHook::new(hook));
        self
    }

    /// Set the full Stop-Hook registry.
    #[must_use]
    pub fn stop_hooks(mut self, stop_hooks: synapse_hooks::StopHookRegistry) -> Self {
        self.stop_hooks = stop_hooks;
        self
    }

    /// Share an externally-owned event bus (defaults to a fresh one).
    #[must_use]
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Share a process-wide todo store (defaults to a fresh, empty one).
    #[must_use]
    pub fn todo_store(mut self, todo_store: Arc<Mutex<TodoStore>>) -> Self {
        self.todo_store = todo_store;
        self
    }

    /// Set the full loop configuration.
    #[must_use]
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the loop. The session is resolved lazily on the first
    /// [`AgentLoop::run`] call: if [`Self::session`] was never called, a
    /// fresh session is created at that point.
    pub async fn build(self) -> Result<AgentLoop<P>, LoopError> {
        let session_id = match self.session_id {
            Some(id) => id,
            None => self.session_store.create(CreateSessionOptions::default()).await?.id,
        };
        let context = ContextOrchestrator::new(self.provider.clone(), self.config.context.clone());
        let bridge = ToolExecutionBridge::new(self.tools.clone(), self.middleware);
        let failure_detector =
            SlidingWindowFailureDetector::new(self.config.failure_window_size, self.config.failure_threshold);
        let todo_reminder = TodoReminderStrategy::new(self.config.todo_stale_threshold_turns);

        Ok(AgentLoop {
            provider: self.provider,
            registry: self.tools,
            bridge,
            context,
            session_store: self.session_store,
            session_id,
            hooks: self.hooks,
            stop_hooks: self.stop_hooks.with_timeout(self.config.stop_hook_timeout),
            bus: self.bus,
            todo_store: self.todo_store,
            todo_reminder,
            failure_detector,
            config: self.config,
            messages: Vec::new(),
            loaded: false,
        })
    }
}
