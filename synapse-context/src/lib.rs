#![deny(missing_docs)]
//! Context Orchestrator: keeps conversation history under the model's
//! effective token window via two mechanisms tried in order — offload
//! (cheap, primary) then compact (fallback, asks the LLM to summarize).

mod compact;
mod counter;
mod offload;

use std::path::{Path, PathBuf};

use synapse_types::{ContextError, Message, Provider};
use tracing::warn;

pub use counter::TokenCounter;
pub use offload::SENTINEL_PREFIX;

/// Tunables for [`ContextOrchestrator`]. Field names mirror the contract's
/// vocabulary directly (`offloadThreshold`, `offloadRatio`, ...).
#[derive(Debug, Clone)]
pub struct ContextOrchestratorConfig {
    /// Token count at or above which orchestration runs.
    pub offload_threshold: usize,
    /// Fraction (0.0-1.0) of the oldest messages eligible for offload.
    pub offload_ratio: f64,
    /// Minimum rendered-text length for a tool result to be offloaded.
    pub min_chars: usize,
    /// Number of trailing messages compact preserves verbatim.
    pub compact_preserve_count: usize,
}

impl Default for ContextOrchestratorConfig {
    fn default() -> Self {
        Self {
            offload_threshold: 100_000,
            offload_ratio: 0.5,
            min_chars: 2_000,
            compact_preserve_count: 10,
        }
    }
}

/// Statistics reported after one orchestration pass.
#[derive(Debug, Clone)]
pub struct OrchestrationStats {
    /// Token estimate before this pass ran.
    pub previous_tokens: usize,
    /// Token estimate after this pass.
    pub current_tokens: usize,
    /// `previous_tokens - current_tokens`, floored at zero.
    pub freed_tokens: usize,
    /// Offload files deleted because compaction made them unreferenced.
    pub deleted_files: Vec<PathBuf>,
    /// Number of trailing messages compact preserved verbatim (0 if compact
    /// did not run).
    pub preserved_count: usize,
    /// Whether the pass completed. `false` only when a compact
    /// summarization call failed; history is left as offload left it.
    pub success: bool,
    /// The resulting message list.
    pub messages: Vec<Message>,
}

/// Runs the offload-then-compact pipeline against a session's history.
pub struct ContextOrchestrator<P: Provider> {
    provider: P,
    counter: TokenCounter,
    config: ContextOrchestratorConfig,
}

impl<P: Provider> ContextOrchestrator<P> {
    /// Build an orchestrator with the given provider (used for compact's
    /// summarization call) and config.
    #[must_use]
    pub fn new(provider: P, config: ContextOrchestratorConfig) -> Self {
        Self { provider, counter: TokenCounter::new(), config }
    }

    /// Build an orchestrator with a custom [`TokenCounter`].
    #[must_use]
    pub fn with_counter(provider: P, config: ContextOrchestratorConfig, counter: TokenCounter) -> Self {
        Self { provider, counter, config }
    }

    /// The current token estimate for a message list.
    #[must_use]
    pub fn token_estimate(&self, messages: &[Message]) -> usize {
        self.counter.estimate_messages(messages)
    }

    /// Run offload, then compact if offload alone didn't bring the count
    /// under `offload_threshold`. No-ops (returning `messages` unchanged)
    /// if already under threshold.
    pub async fn orchestrate_if_needed(
        &self,
        messages: Vec<Message>,
        offload_dir: &Path,
    ) -> Result<OrchestrationStats, ContextError> {
        let previous_tokens = self.counter.estimate_messages(&messages);
        if previous_tokens < self.config.offload_threshold {
            let count = messages.len();
            return Ok(OrchestrationStats {
                previous_tokens,
                current_tokens: previous_tokens,
                freed_tokens: 0,
                deleted_files: vec![],
                preserved_count: count,
                success: true,
                messages,
            });
        }
        self.run(messages, offload_dir, previous_tokens).await
    }

    /// Run compact unconditionally, regardless of current token count.
    /// Offload still runs first since it's strictly cheaper.
    pub async fn force_compact(
        &self,
        messages: Vec<Message>,
        offload_dir: &Path,
    ) -> Result<OrchestrationStats, ContextError> {
        let previous_tokens = self.counter.estimate_messages(&messages);
        self.run(messages, offload_dir, previous_tokens).await
    }

    async fn run(
        &self,
        mut messages: Vec<Message>,
        offload_dir: &Path,
        previous_tokens: usize,
    ) -> Result<OrchestrationStats, ContextError> {
        offload::run(&mut messages, offload_dir, self.config.offload_ratio, self.config.min_chars)
            .await?;

        let after_offload_tokens = self.counter.estimate_messages(&messages);
        if after_offload_tokens < self.config.offload_threshold {
            let count = messages.len();
            return Ok(OrchestrationStats {
                previous_tokens,
                current_tokens: after_offload_tokens,
                freed_tokens: previous_tokens.saturating_sub(after_offload_tokens),
                deleted_files: vec![],
                preserved_count: count,
                success: true,
                messages,
            });
        }

        match compact::run(messages.clone(), &self.provider, self.config.compact_preserve_count).await {
            Ok(outcome) => {
                for path in &outcome.unreferenced_files {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        warn!(path = %path.display(), error = %e, "failed to delete unreferenced offload file");
                    }
                }
                let current_tokens = self.counter.estimate_messages(&outcome.messages);
                Ok(OrchestrationStats {
                    previous_tokens,
                    current_tokens,
                    freed_tokens: previous_tokens.saturating_sub(current_tokens),
                    deleted_files: outcome.unreferenced_files,
                    preserved_count: outcome.messages.len() - usize::from(outcome.compacted_count > 0),
                    success: true,
                    messages: outcome.messages,
                })
            }
            Err(e) => {
                warn!(error = %e, "compact summarization failed, leaving post-offload history unchanged");
                Ok(OrchestrationStats {
                    previous_tokens,
                    current_tokens: after_offload_tokens,
                    freed_tokens: previous_tokens.saturating_sub(after_offload_tokens),
                    deleted_files: vec![],
                    preserved_count: messages.len(),
                    success: false,
                    messages,
                })
            }
        }
    }
}
