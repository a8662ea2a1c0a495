//! The concrete [`SubAgentRunner`] implementation: a fresh session and a
//! fresh [`AgentLoop`] per spawned sub-agent, wired with `is_primary: false`
//! so sub-agents never see the skill-search prefix or the Todo Reminder
//! Strategy.

use std::sync::Arc;

use async_trait::async_trait;
use synapse_events::EventEmitter;
use synapse_orch::{SubAgentOutput, SubAgentRunner, SubAgentSpec};
use synapse_session::{CreateSessionOptions, SessionStore};
use synapse_tool::ToolRegistry;
use synapse_types::{LoopError, Provider, ToolContext};
use tokio_util::sync::CancellationToken;

use crate::config::LoopConfig;
use crate::loop_impl::AgentLoop;

/// Spawns a sub-agent as a brand new [`AgentLoop`] over its own session,
/// sharing the parent's provider and session store.
pub struct LoopSubAgentRunner<P: Provider + Clone> {
    provider: P,
    session_store: Arc<dyn SessionStore>,
    base_config: LoopConfig,
}

impl<P: Provider + Clone> LoopSubAgentRunner<P> {
    /// `base_config` is cloned per sub-agent with `is_primary` forced to
    /// `false`; everything else (iteration caps, failure thresholds, stop
    /// hooks are not carried — sub-agents run without the parent's
    /// Stop-Hook pipeline, which only applies to the primary agent's final
    /// answer) is inherited as-is.
    #[must_use]
    pub fn new(provider: P, session_store: Arc<dyn SessionStore>, base_config: LoopConfig) -> Self {
        Self { provider, session_store, base_config }
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> SubAgentRunner for LoopSubAgentRunner<P> {
    async fn run(
        &self,
        spec: SubAgentSpec,
        tools: ToolRegistry,
        events: EventEmitter,
        cancellation: CancellationToken,
    ) -> Result<SubAgentOutput, LoopError> {
        let session = self
            .session_store
            .create(CreateSessionOptions::default())
            .await?;

        let mut config = self.base_config.clone();
        config.is_primary = false;

        let mut agent_loop = AgentLoop::builder(self.provider.clone(), self.session_store.clone())
            .session(session.id)
            .tools(tools)
            .config(config)
            .build()
            .await?;

        let tool_ctx = ToolContext { cancellation_token: cancellation, ..ToolContext::default() };
        let result = agent_loop.run(&spec.task, &tool_ctx, &events).await?;
        Ok(SubAgentOutput { result: result.response })
    }
}
