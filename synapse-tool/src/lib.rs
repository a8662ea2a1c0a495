#![deny(missing_docs)]
//! Tool Execution Bridge: a registry of tools, a middleware chain wrapping
//! every call, and a dispatcher that turns `tool_use` blocks into
//! `tool_result` blocks without ever propagating an error.

mod bridge;
mod builtin;
mod middleware;
mod permission;
mod registry;

pub use bridge::{DefaultFailureClassifier, ExecutedCall, FailureCategory, FailureClassifier, ToolExecutionBridge};
pub use builtin::{OutputFormatter, PermissionChecker, SchemaValidator, TimeoutMiddleware};
pub use middleware::{Next, ToolCall, ToolMiddleware};
pub use permission::{AllowAll, PermissionDecision, PermissionPolicy};
pub use registry::ToolRegistry;
