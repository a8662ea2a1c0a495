#![deny(missing_docs)]
//! # synapse — agent execution core, umbrella crate
//!
//! Provides a single import surface over the crates that make up the
//! Agent Loop: core types, event bus, session persistence, sanitizer,
//! failure detector, todo reminders, message validator, context
//! orchestrator, tool registry/bridge, stop-hook pipeline, and sub-agent
//! orchestration. Re-exports each behind a feature flag, plus a `prelude`
//! for the common path of building and running a loop.

#[cfg(feature = "core")]
pub use layer0;
#[cfg(feature = "core")]
pub use synapse_context;
#[cfg(feature = "core")]
pub use synapse_events;
#[cfg(feature = "core")]
pub use synapse_failure_detector;
#[cfg(feature = "core")]
pub use synapse_hooks;
#[cfg(feature = "loop")]
pub use synapse_loop;
#[cfg(feature = "core")]
pub use synapse_orch;
#[cfg(feature = "provider-anthropic")]
pub use synapse_provider_anthropic;
#[cfg(feature = "core")]
pub use synapse_sanitizer;
#[cfg(feature = "core")]
pub use synapse_session;
#[cfg(feature = "core")]
pub use synapse_todo;
#[cfg(feature = "core")]
pub use synapse_tool;
#[cfg(feature = "core")]
pub use synapse_types;
#[cfg(feature = "core")]
pub use synapse_validator;

/// Happy-path imports for building and running an agent loop.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use synapse_types::{
        CompletionRequest, CompletionResponse, ContentBlock, ContentItem, LoopError, Message,
        Provider, ProviderError, Role, StopReason, SystemPrompt, ToolChoice, ToolContext,
        ToolDefinition, ToolDyn, ToolError, ToolOutput, TokenUsage,
    };

    #[cfg(feature = "core")]
    pub use synapse_events::{AgentEvent, EventBus, EventEmitter, EventStream};

    #[cfg(feature = "core")]
    pub use synapse_session::{CreateSessionOptions, FsSessionStore, Session, SessionStore};

    #[cfg(feature = "core")]
    pub use synapse_context::{ContextOrchestrator, ContextOrchestratorConfig};

    #[cfg(feature = "core")]
    pub use synapse_tool::{PermissionPolicy, ToolExecutionBridge, ToolRegistry};

    #[cfg(feature = "core")]
    pub use synapse_hooks::StopHookRegistry;

    #[cfg(feature = "core")]
    pub use synapse_orch::{SubAgentRunner, SubAgentSpawner, SubAgentSpec};

    #[cfg(feature = "loop")]
    pub use synapse_loop::{AgentLoop, AgentLoopBuilder, AgentResult, LoopConfig, LoopSubAgentRunner, TerminationReason};

    #[cfg(feature = "provider-anthropic")]
    pub use synapse_provider_anthropic::AnthropicProvider;
}

#[cfg(all(test, feature = "loop", feature = "provider-anthropic"))]
mod tests {
    use std::sync::Arc;

    use synapse_session::{CreateSessionOptions, FsSessionStore, SessionStore};
    use synapse_types::{CompletionRequest, CompletionResponse, Message, Provider, ProviderError, StopReason, StreamHandle, TokenUsage};

    use super::prelude::*;

    #[derive(Clone)]
    struct EchoProvider;

    impl Provider for EchoProvider {
        fn complete(
            &self,
            _request: CompletionRequest,
        ) -> impl std::future::Future<Output = Result<CompletionResponse, ProviderError>> + Send {
            async move {
                Ok(CompletionResponse {
                    id: "msg_echo".to_string(),
                    model: "echo".to_string(),
                    message: Message::assistant("hello from synapse"),
                    usage: TokenUsage::default(),
                    stop_reason: StopReason::EndTurn,
                })
            }
        }

        fn complete_stream(
            &self,
            _request: CompletionRequest,
        ) -> impl std::future::Future<Output = Result<StreamHandle, ProviderError>> + Send {
            async move { Err(ProviderError::Other("streaming not used in this test".to_string())) }
        }
    }

    #[tokio::test]
    async fn facade_wires_a_runnable_loop() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn SessionStore> = Arc::new(FsSessionStore::new(dir.path().to_path_buf()));
        let session = store.create(CreateSessionOptions::default()).await.unwrap();

        let mut agent_loop = AgentLoop::builder(EchoProvider, store.clone())
            .session(session.id)
            .build()
            .await
            .unwrap();

        let (events, _stream) = EventStream::new();
        let tool_ctx = synapse_types::ToolContext::default();
        let result = agent_loop.run("hi", &tool_ctx, &events).await.unwrap();

        assert_eq!(result.response, "hello from synapse");
    }
}
