//! The middleware chain: `PermissionChecker` → `SchemaValidator` →
//! `OutputFormatter` → `TimeoutMiddleware`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use synapse_types::{ContentItem, ToolContext, ToolError, ToolOutput, WasmBoxedFuture};

use crate::middleware::{Next, ToolCall, ToolMiddleware};
use crate::permission::{PermissionDecision, PermissionPolicy};
use crate::registry::ToolRegistry;

/// Rejects a call the policy denies or wants confirmation for.
pub struct PermissionChecker {
    policy: Arc<dyn PermissionPolicy>,
}

impl PermissionChecker {
    /// Build a checker around a policy.
    #[must_use]
    pub fn new(policy: impl PermissionPolicy + 'static) -> Self {
        Self { policy: Arc::new(policy) }
    }
}

impl ToolMiddleware for PermissionChecker {
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> WasmBoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            match self.policy.check(&call.name, &call.input) {
                PermissionDecision::Allow => next.run(call, ctx).await,
                PermissionDecision::Deny(reason) => {
                    Err(ToolError::PermissionDenied { tool: call.name.clone(), reason })
                }
                PermissionDecision::Ask(reason) => Err(ToolError::PermissionDenied {
                    tool: call.name.clone(),
                    reason: format!("requires confirmation: {reason}"),
                }),
            }
        })
    }
}

/// Validates call input against the tool's JSON Schema, snapshotted at
/// construction from the registry.
///
/// Lightweight structural checks only (object shape, required fields,
/// property types) — not a full JSON Schema implementation.
pub struct SchemaValidator {
    schemas: HashMap<String, serde_json::Value>,
}

impl SchemaValidator {
    /// Snapshot every registered tool's schema. Tools registered on
    /// `registry` after this call are not validated.
    #[must_use]
    pub fn new(registry: &ToolRegistry) -> Self {
        let schemas =
            registry.definitions().into_iter().map(|def| (def.name, def.input_schema)).collect();
        Self { schemas }
    }
}

impl ToolMiddleware for SchemaValidator {
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> WasmBoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            if let Some(schema) = self.schemas.get(&call.name) {
                validate_input(&call.name, &call.input, schema)?;
            }
            next.run(call, ctx).await
        })
    }
}

fn validate_input(tool: &str, input: &serde_json::Value, schema: &serde_json::Value) -> Result<(), ToolError> {
    let invalid = |reason: String| ToolError::InvalidInput { tool: tool.to_string(), reason };

    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(serde_json::Value::String(ty)) = schema_obj.get("type") {
        if ty == "object" && !input.is_object() {
            return Err(invalid("expected object input".to_string()));
        }
    }

    let Some(input_obj) = input.as_object() else {
        return Ok(());
    };

    if let Some(serde_json::Value::Array(required)) = schema_obj.get("required") {
        for field in required {
            if let Some(name) = field.as_str() {
                if !input_obj.contains_key(name) {
                    return Err(invalid(format!("missing required field: {name}")));
                }
            }
        }
    }

    if let Some(serde_json::Value::Object(properties)) = schema_obj.get("properties") {
        for (field_name, prop_schema) in properties {
            if let Some(value) = input_obj.get(field_name) {
                if let Some(serde_json::Value::String(expected)) = prop_schema.get("type") {
                    if !json_type_matches(value, expected) {
                        return Err(invalid(format!(
                            "field '{field_name}' expected type '{expected}', got {}",
                            json_type_name(value)
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

fn json_type_matches(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Truncates text output content items past a character limit, UTF-8-safe.
pub struct OutputFormatter {
    max_chars: usize,
}

impl OutputFormatter {
    /// Build a formatter truncating text content at `max_chars`.
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl ToolMiddleware for OutputFormatter {
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> WasmBoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let mut output = next.run(call, ctx).await?;
            output.content = output
                .content
                .into_iter()
                .map(|item| match item {
                    ContentItem::Text(text) if text.len() > self.max_chars => {
                        let mut boundary = self.max_chars;
                        while boundary > 0 && !text.is_char_boundary(boundary) {
                            boundary -= 1;
                        }
                        ContentItem::Text(format!(
                            "{}... [truncated, {} chars total]",
                            &text[..boundary],
                            text.len()
                        ))
                    }
                    other => other,
                })
                .collect();
            Ok(output)
        })
    }
}

/// Enforces a timeout on tool execution, with optional per-tool overrides.
pub struct TimeoutMiddleware {
    default_timeout: Duration,
    per_tool: HashMap<String, Duration>,
}

impl TimeoutMiddleware {
    /// Build with a default timeout applied to every tool without an
    /// override.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout, per_tool: HashMap::new() }
    }

    /// Override the timeout for one tool by name.
    #[must_use]
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.per_tool.insert(tool_name.into(), timeout);
        self
    }
}

impl ToolMiddleware for TimeoutMiddleware {
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> WasmBoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let timeout = self.per_tool.get(&call.name).unwrap_or(&self.default_timeout);
            match tokio::time::timeout(*timeout, next.run(call, ctx)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ToolError::Timeout {
                    tool: call.name.clone(),
                    elapsed_ms: timeout.as_millis() as u64,
                }),
            }
        })
    }
}
