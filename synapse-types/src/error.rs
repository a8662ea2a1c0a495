//! Error taxonomy for the agent execution core.
//!
//! Each concern (provider, tool, context, session, hook) gets its own error
//! enum; [`LoopError`] composes them via `#[from]` so the Agent Loop can
//! report one classified error per iteration without losing the original
//! cause.

use thiserror::Error;

/// Errors from an LLM provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials were rejected or missing.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The provider rate-limited this request.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested backoff, if the provider returned one.
        retry_after: Option<std::time::Duration>,
    },
    /// The request exceeded the model's context window.
    #[error("context length exceeded: {0}")]
    ContextLength(String),
    /// The response stream ended unexpectedly.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
    /// The requested model is unknown to the provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// Any other provider-side failure.
    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether retrying the same request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::StreamInterrupted(_))
    }
}

/// Errors from tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// The tool's input failed schema validation.
    #[error("invalid tool input for {tool}: {reason}")]
    InvalidInput {
        /// The tool name.
        tool: String,
        /// Why validation failed.
        reason: String,
    },
    /// A permission middleware denied or requires confirmation for this call.
    #[error("permission denied for {tool}: {reason}")]
    PermissionDenied {
        /// The tool name.
        tool: String,
        /// Why permission was denied.
        reason: String,
    },
    /// The tool exceeded its execution timeout.
    #[error("tool {tool} timed out after {elapsed_ms}ms")]
    Timeout {
        /// The tool name.
        tool: String,
        /// Elapsed time before cancellation.
        elapsed_ms: u64,
    },
    /// Execution was cancelled cooperatively.
    #[error("tool {0} execution aborted")]
    Aborted(String),
    /// The tool itself returned a failure (distinct from an infra error).
    #[error("tool {tool} failed: {reason}")]
    ExecutionFailed {
        /// The tool name.
        tool: String,
        /// The failure reason.
        reason: String,
    },
}

/// Errors from the Context Orchestrator.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The model's turn contains messages too large to compact further.
    #[error("context cannot be reduced below {tokens} tokens")]
    Irreducible {
        /// Estimated token count after the best-effort reduction.
        tokens: usize,
    },
    /// An offloaded message could not be retrieved.
    #[error("offload read failed: {0}")]
    OffloadUnavailable(String),
    /// A summarization call to the provider failed.
    #[error("compaction summarization failed: {0}")]
    SummarizationFailed(String),
}

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session exists under the requested ID.
    #[error("session not found: {0}")]
    NotFound(String),
    /// The on-disk session index or log was corrupt or unreadable.
    #[error("session storage corrupt: {0}")]
    Corrupt(String),
    /// An I/O failure while reading or writing session state.
    #[error("session io error: {0}")]
    Io(#[from] std::io::Error),
    /// The session's serialized form failed to parse.
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from an observability or stop-hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook itself failed (bug or IO error within the hook).
    #[error("hook {hook} failed: {reason}")]
    Failed {
        /// The hook's name.
        hook: String,
        /// The failure reason.
        reason: String,
    },
    /// The hook tripped a guardrail and asked to abort the turn.
    #[error("hook {hook} tripped: {reason}")]
    Tripwire {
        /// The hook's name.
        hook: String,
        /// Why the hook tripped.
        reason: String,
    },
    /// The hook exceeded its allotted wall-clock budget.
    #[error("hook {hook} timed out")]
    Timeout {
        /// The hook's name.
        hook: String,
    },
}

/// A durable-execution failure (checkpoint/replay boundary).
#[derive(Debug, Error)]
pub enum DurableError {
    /// The underlying durable-execution engine rejected the call.
    #[error("durable execution error: {0}")]
    Engine(String),
    /// Waiting for an external signal timed out.
    #[error("signal {signal} timed out")]
    SignalTimeout {
        /// The signal name that was awaited.
        signal: String,
    },
}

/// The top-level error the Agent Loop surfaces for a failed iteration.
///
/// Composes the per-concern errors above. `is_recoverable` drives whether
/// the Sliding-Window Failure Detector counts this iteration as a failure
/// the loop can retry past, or one that should abort the run.
#[derive(Debug, Error)]
pub enum LoopError {
    /// Provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Tool execution failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// Context management failed.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Session persistence failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// A hook failed or tripped.
    #[error(transparent)]
    Hook(#[from] HookError),
    /// Durable execution failed.
    #[error(transparent)]
    Durable(#[from] DurableError),
    /// No command matches the requested slash-command or tool name.
    #[error("command not found: {0}")]
    CommandNotFound(String),
    /// Loop or provider configuration was invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A referenced file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// An operation was denied by policy, outside of tool middleware.
    #[error("permission error: {0}")]
    Permission(String),
    /// The run was cancelled via its `CancellationToken`.
    #[error("aborted")]
    Aborted,
    /// A skill definition failed validation on load.
    #[error("skill validation failed: {0}")]
    SkillValidation(String),
    /// Any other unclassified failure.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl LoopError {
    /// Whether the Sliding-Window Failure Detector should count this
    /// iteration as recoverable (the loop may continue past it) rather than
    /// fatal (the run should stop).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Tool(ToolError::Timeout { .. } | ToolError::ExecutionFailed { .. }) => true,
            Self::Tool(_) => false,
            Self::Context(ContextError::SummarizationFailed(_)) => true,
            Self::Context(_) => false,
            Self::Hook(HookError::Tripwire { .. }) => false,
            Self::Hook(HookError::Failed { .. }) => true,
            Self::Session(_) | Self::Durable(_) => false,
            Self::CommandNotFound(_) | Self::SkillValidation(_) => true,
            Self::Configuration(_) | Self::FileNotFound(_) | Self::Permission(_) => false,
            Self::Aborted => false,
            Self::Unknown(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable_and_recoverable() {
        let e = ProviderError::RateLimit { retry_after: None };
        assert!(e.is_retryable());
        let loop_err: LoopError = e.into();
        assert!(loop_err.is_recoverable());
    }

    #[test]
    fn permission_denied_is_not_recoverable() {
        let e = LoopError::from(ToolError::PermissionDenied {
            tool: "bash".into(),
            reason: "denied".into(),
        });
        assert!(!e.is_recoverable());
    }

    #[test]
    fn hook_tripwire_is_not_recoverable_but_failure_is() {
        let tripped = LoopError::from(HookError::Tripwire {
            hook: "guardrail".into(),
            reason: "policy violation".into(),
        });
        assert!(!tripped.is_recoverable());

        let failed = LoopError::from(HookError::Failed {
            hook: "logger".into(),
            reason: "io error".into(),
        });
        assert!(failed.is_recoverable());
    }
}
