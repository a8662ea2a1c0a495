#![deny(missing_docs)]
//! Sub-Agent Core: spawns an isolated agent sharing the parent's provider
//! but with a filtered tool set and an independent event stream.
//!
//! Grounded in `layer0::operator::Operator` and `neuron-orch-local`'s
//! `LocalOrch`: rather than depending on `synapse-loop` directly (which
//! would be circular — the loop depends on this crate to spawn
//! sub-agents), the actual run is delegated to an injected
//! `Arc<dyn SubAgentRunner>`, mirroring `LocalOrch`'s
//! `HashMap<AgentId, Arc<dyn Operator>>` dispatch table.

mod permissions;

pub use permissions::{SubAgentType, ToolFilter, ToolInclude};

use std::sync::Arc;

use async_trait::async_trait;
use synapse_events::{EventEmitter, EventStream};
use synapse_tool::ToolRegistry;
use synapse_types::LoopError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What to spawn: the sub-agent's type (drives default tool permissions),
/// its task, and overrides.
#[derive(Debug, Clone)]
pub struct SubAgentSpec {
    /// Drives the default include/exclude tool filter.
    pub agent_type: SubAgentType,
    /// The task text handed to the sub-agent as its first user message.
    pub task: String,
    /// Declared tool names for `SubAgentType::Skill`; ignored otherwise.
    pub skill_tools: Option<Vec<String>>,
    /// Overrides the type's default filter entirely, when set.
    pub filter_override: Option<ToolFilter>,
}

impl SubAgentSpec {
    /// A spec for the given type and task, using that type's default filter.
    #[must_use]
    pub fn new(agent_type: SubAgentType, task: impl Into<String>) -> Self {
        Self { agent_type, task: task.into(), skill_tools: None, filter_override: None }
    }

    fn filter(&self) -> ToolFilter {
        self.filter_override
            .clone()
            .unwrap_or_else(|| ToolFilter::defaults_for(self.agent_type, self.skill_tools.clone()))
    }
}

/// What a sub-agent produced once its run finished.
#[derive(Debug, Clone)]
pub struct SubAgentOutput {
    /// The sub-agent's final text response.
    pub result: String,
}

/// Runs one sub-agent to completion. Implemented by `synapse-loop` over a
/// fresh `AgentLoop`; kept as a trait here so this crate never depends on
/// the loop crate.
#[async_trait]
pub trait SubAgentRunner: Send + Sync {
    /// Execute `spec` against `tools`, emitting onto `events` until it
    /// completes or `cancellation` fires.
    async fn run(
        &self,
        spec: SubAgentSpec,
        tools: ToolRegistry,
        events: EventEmitter,
        cancellation: CancellationToken,
    ) -> Result<SubAgentOutput, LoopError>;
}

/// A handle to a sub-agent running on its own `tokio` task.
pub struct SubAgentHandle {
    /// The sub-agent's own event stream, independent of the parent's.
    pub events: EventStream,
    /// Cancels this sub-agent without affecting the parent or siblings.
    pub cancellation: CancellationToken,
    join: JoinHandle<Result<SubAgentOutput, LoopError>>,
}

impl SubAgentHandle {
    /// Wait for the sub-agent to finish. A parent's own completion does not
    /// implicitly cancel or block on sub-agents already spawned — callers
    /// that want to await completion do so explicitly here.
    pub async fn join(self) -> Result<SubAgentOutput, LoopError> {
        match self.join.await {
            Ok(result) => result,
            Err(join_error) => Err(LoopError::Configuration(format!(
                "sub-agent task panicked: {join_error}"
            ))),
        }
    }
}

/// Builds and spawns sub-agents that share the parent's provider and full
/// tool registry but run in isolation otherwise.
#[derive(Clone)]
pub struct SubAgentSpawner {
    tools: ToolRegistry,
    runner: Arc<dyn SubAgentRunner>,
    parent_cancellation: CancellationToken,
}

impl SubAgentSpawner {
    /// Build a spawner over the parent's full tool registry and an
    /// injected runner. `parent_cancellation` is the token sub-agents are
    /// child-linked to: canceling the parent cancels every sub-agent spawned
    /// from it, but canceling a sub-agent never propagates back up.
    #[must_use]
    pub fn new(tools: ToolRegistry, runner: Arc<dyn SubAgentRunner>, parent_cancellation: CancellationToken) -> Self {
        Self { tools, runner, parent_cancellation }
    }

    /// Spawn a sub-agent on its own `tokio` task, returning a handle to its
    /// event stream and a joinable completion.
    pub fn spawn(&self, spec: SubAgentSpec) -> SubAgentHandle {
        let filter = spec.filter();
        let filtered_tools = self.tools.filtered(|name| filter.keeps(name));
        let (emitter, events) = EventStream::new();
        let cancellation = self.parent_cancellation.child_token();

        let runner = self.runner.clone();
        let task_cancellation = cancellation.clone();
        let join = tokio::spawn(async move { runner.run(spec, filtered_tools, emitter, task_cancellation).await });

        SubAgentHandle { events, cancellation, join }
    }
}
