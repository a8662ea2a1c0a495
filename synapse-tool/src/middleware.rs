//! Middleware chain wrapping tool execution.
//!
//! Same pattern as axum's `from_fn`: each middleware receives a [`Next`] it
//! can call to continue the chain, or skip to short-circuit.

use std::sync::Arc;

use synapse_types::{ToolContext, ToolDyn, ToolError, ToolOutput, WasmBoxedFuture, WasmCompatSend, WasmCompatSync};

/// A tool call in flight through the middleware pipeline.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Identifier for this call, from the model's `tool_use.id`.
    pub id: String,
    /// Name of the tool being called.
    pub name: String,
    /// JSON input arguments.
    pub input: serde_json::Value,
}

/// Middleware wrapping tool execution: inspect/modify the call, short
/// circuit by not calling `next.run()`, or inspect/modify the result.
///
/// Uses boxed futures rather than RPITIT so heterogeneous middleware can be
/// stored as `Arc<dyn ToolMiddleware>` in one chain.
pub trait ToolMiddleware: WasmCompatSend + WasmCompatSync {
    /// Process a call, optionally delegating to the rest of the chain.
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> WasmBoxedFuture<'a, Result<ToolOutput, ToolError>>;
}

/// The remaining middleware chain plus the underlying tool. Consumed on
/// call to prevent double invocation.
pub struct Next<'a> {
    tool: &'a dyn ToolDyn,
    middleware: &'a [Arc<dyn ToolMiddleware>],
}

impl<'a> Next<'a> {
    /// Build a `Next` over a tool and the middleware still to run.
    #[must_use]
    pub fn new(tool: &'a dyn ToolDyn, middleware: &'a [Arc<dyn ToolMiddleware>]) -> Self {
        Self { tool, middleware }
    }

    /// Continue the chain, eventually invoking the tool itself.
    pub async fn run(self, call: &'a ToolCall, ctx: &'a ToolContext) -> Result<ToolOutput, ToolError> {
        if let Some((head, tail)) = self.middleware.split_first() {
            let next = Next::new(self.tool, tail);
            head.process(call, ctx, next).await
        } else {
            self.tool.execute(call.input.clone(), ctx).await
        }
    }
}
