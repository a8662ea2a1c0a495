//! Configuration for the Agent Loop and its component thresholds.

use std::time::Duration;

use synapse_context::ContextOrchestratorConfig;
use synapse_types::SystemPrompt;

/// Configuration for one [`crate::AgentLoop`].
///
/// Field names mirror the environment-variable table the rest of this
/// codebase documents (`SYNAPSE_MAX_TOOL_ITERATIONS` and friends);
/// [`LoopConfig::from_env`] reads those directly.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// The system prompt sent with every completion request.
    pub system_prompt: SystemPrompt,
    /// Hard cap on loop iterations. `SYNAPSE_MAX_TOOL_ITERATIONS`, default 50.
    pub max_iterations: usize,
    /// Sliding-Window Failure Detector window size. `SYNAPSE_FAILURE_WINDOW_SIZE`.
    pub failure_window_size: usize,
    /// Sliding-Window Failure Detector threshold. `SYNAPSE_MAX_CONSECUTIVE_TOOL_FAILURES`.
    pub failure_threshold: usize,
    /// Turns of staleness before the Todo Reminder Strategy nudges the model.
    pub todo_stale_threshold_turns: u32,
    /// Per-hook timeout for the Stop-Hook pipeline. `SYNAPSE_SKILL_SUBAGENT_TIMEOUT` (ms).
    pub stop_hook_timeout: Duration,
    /// Whether tool calls within one turn execute concurrently.
    pub parallel_tool_execution: bool,
    /// Whether this loop instance is the primary agent (governs the
    /// skill-search prefix and the Todo Reminder Strategy — sub-agents get
    /// neither).
    pub is_primary: bool,
    /// Context Orchestrator tunables.
    pub context: ContextOrchestratorConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            system_prompt: SystemPrompt::Text(String::new()),
            max_iterations: 50,
            failure_window_size: 10,
            failure_threshold: 3,
            todo_stale_threshold_turns: 5,
            stop_hook_timeout: Duration::from_millis(300_000),
            parallel_tool_execution: false,
            is_primary: true,
            context: ContextOrchestratorConfig::default(),
        }
    }
}

impl LoopConfig {
    /// Build a config from defaults overridden by whichever environment
    /// variables are set and parse cleanly; malformed values are ignored in
    /// favor of the default, not rejected.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_usize("SYNAPSE_MAX_TOOL_ITERATIONS") {
            config.max_iterations = v;
        }
        if let Some(v) = env_usize("SYNAPSE_MAX_CONSECUTIVE_TOOL_FAILURES") {
            config.failure_threshold = v;
        }
        if let Some(v) = env_usize("SYNAPSE_FAILURE_WINDOW_SIZE") {
            config.failure_window_size = v;
        }
        if let Some(v) = env_usize("SYNAPSE_SKILL_SUBAGENT_TIMEOUT") {
            config.stop_hook_timeout = Duration::from_millis(v as u64);
        }
        config
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
