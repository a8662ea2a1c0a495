//! Turns `tool_use` blocks into `tool_result` blocks. Never throws.

use std::collections::HashMap;
use std::sync::Arc;

use synapse_types::{ContentBlock, ToolContext, ToolError};

use crate::middleware::{Next, ToolCall, ToolMiddleware};
use crate::registry::ToolRegistry;

/// How a failed tool result should count toward the Sliding-Window Failure
/// Detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Feeds the detector's window.
    Countable,
    /// A permission middleware denied or needed confirmation. Bypasses the
    /// window — repeatedly denying one tool shouldn't look like the model
    /// flailing.
    PermissionDenied,
    /// Execution was cooperatively aborted (user interrupt). Bypasses the
    /// window for the same reason.
    UserInterrupt,
}

/// Classifies a failed tool result for the failure detector. Injected so
/// callers can recognize domain-specific non-countable failures.
pub trait FailureClassifier: Send + Sync {
    /// Classify one execution error.
    fn classify(&self, error: &ToolError) -> FailureCategory;
}

/// The reference classifier: permission denials and aborts are
/// non-countable, everything else (not-found, invalid input, timeout,
/// execution failure) is countable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFailureClassifier;

impl FailureClassifier for DefaultFailureClassifier {
    fn classify(&self, error: &ToolError) -> FailureCategory {
        match error {
            ToolError::PermissionDenied { .. } => FailureCategory::PermissionDenied,
            ToolError::Aborted(_) => FailureCategory::UserInterrupt,
            _ => FailureCategory::Countable,
        }
    }
}

/// One executed call's outcome.
pub struct ExecutedCall {
    /// The `tool_result` block to append to history, paired by `tool_use_id`.
    pub block: ContentBlock,
    /// Classification of the failure, present only when `block` is an
    /// error result.
    pub failure: Option<FailureCategory>,
}

/// Dispatches tool calls through the middleware chain, deduplicating
/// identical calls within a turn and never propagating an error out —
/// every call produces a `tool_result` block, synthesizing one on miss or
/// on middleware/tool failure.
pub struct ToolExecutionBridge<C: FailureClassifier = DefaultFailureClassifier> {
    registry: ToolRegistry,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
    classifier: C,
}

impl ToolExecutionBridge<DefaultFailureClassifier> {
    /// Build a bridge with the reference failure classifier.
    #[must_use]
    pub fn new(registry: ToolRegistry, middleware: Vec<Arc<dyn ToolMiddleware>>) -> Self {
        Self { registry, middleware, classifier: DefaultFailureClassifier }
    }
}

impl<C: FailureClassifier> ToolExecutionBridge<C> {
    /// Build a bridge with a custom failure classifier.
    #[must_use]
    pub fn with_classifier(registry: ToolRegistry, middleware: Vec<Arc<dyn ToolMiddleware>>, classifier: C) -> Self {
        Self { registry, middleware, classifier }
    }

    /// Execute every call, in order, returning one `ExecutedCall` per input
    /// call (same length, same order). Identical `(name, input)` pairs are
    /// executed once and fanned out to every matching call.
    ///
    /// When `parallel` is true and there is more than one distinct call,
    /// every group runs concurrently via `futures::future::join_all`;
    /// otherwise groups run one at a time in call order. Either way, results
    /// are reassembled in the order of the original `calls` slice, so a
    /// caller can't observe which path ran from the output shape alone.
    pub async fn execute(&self, calls: &[ToolCall], ctx: &ToolContext, parallel: bool) -> Vec<ExecutedCall> {
        let mut group_of: HashMap<(String, String), usize> = HashMap::new();
        let mut unique_calls: Vec<&ToolCall> = Vec::new();
        let mut group_for_call = Vec::with_capacity(calls.len());

        for call in calls {
            let key = (call.name.clone(), call.input.to_string());
            let group_idx = *group_of.entry(key).or_insert_with(|| {
                unique_calls.push(call);
                unique_calls.len() - 1
            });
            group_for_call.push(group_idx);
        }

        let group_results: Vec<Result<synapse_types::ToolOutput, ToolError>> =
            if parallel && unique_calls.len() > 1 {
                let futures = unique_calls.iter().map(|call| self.execute_one(call, ctx));
                futures::future::join_all(futures).await
            } else {
                let mut results = Vec::with_capacity(unique_calls.len());
                for call in &unique_calls {
                    results.push(self.execute_one(call, ctx).await);
                }
                results
            };

        calls
            .iter()
            .zip(group_for_call)
            .map(|(call, group_idx)| self.to_executed_call(call, &group_results[group_idx]))
            .collect()
    }

    async fn execute_one(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> Result<synapse_types::ToolOutput, ToolError> {
        let Some(tool) = self.registry.get(&call.name) else {
            return Err(ToolError::NotFound(call.name.clone()));
        };
        let next = Next::new(tool.as_ref(), &self.middleware);
        next.run(call, ctx).await
    }

    fn to_executed_call(
        &self,
        call: &ToolCall,
        result: &Result<synapse_types::ToolOutput, ToolError>,
    ) -> ExecutedCall {
        match result {
            Ok(output) => ExecutedCall {
                block: ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: output.content.clone(),
                    is_error: output.is_error,
                },
                failure: output.is_error.then_some(FailureCategory::Countable),
            },
            Err(ToolError::NotFound(name)) => ExecutedCall {
                block: ContentBlock::tool_error(&call.id, format!("Tool not found: {name}")),
                failure: Some(FailureCategory::Countable),
            },
            Err(error) => ExecutedCall {
                block: ContentBlock::tool_error(&call.id, format!("Tool execution failed: {error}")),
                failure: Some(self.classifier.classify(error)),
            },
        }
    }
}
