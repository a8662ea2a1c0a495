#![deny(missing_docs)]
//! Validates a to-be-appended assistant message's `tool_use` blocks before
//! they touch history (rules V1-V2), rather than letting malformed plans
//! crash the loop.

use std::collections::HashSet;

use synapse_types::{ContentBlock, Message};

/// A single validation failure against one `tool_use` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The offending `tool_use` block's id.
    pub tool_use_id: String,
    /// Human-readable reason, used to synthesize an error tool result.
    pub reason: String,
}

/// The outcome of validating a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the message passed every rule.
    pub valid: bool,
    /// Every rule violation found, in block order.
    pub errors: Vec<ValidationError>,
}

/// Validate a candidate assistant message against V1 (input must be a
/// non-null JSON object; arrays are allowed, strings/primitives are not)
/// and V2 (`tool_use.id` unique within this message).
#[must_use]
pub fn validate(message: &Message) -> ValidationResult {
    let mut errors = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for block in &message.content {
        let ContentBlock::ToolUse { id, input, .. } = block else {
            continue;
        };

        if !seen_ids.insert(id.as_str()) {
            errors.push(ValidationError {
                tool_use_id: id.clone(),
                reason: format!("duplicate tool_use id within message: {id}"),
            });
        }

        if !is_object_or_array(input) {
            errors.push(ValidationError {
                tool_use_id: id.clone(),
                reason: format!(
                    "tool_use input must be a JSON object, got {}",
                    json_type_name(input)
                ),
            });
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

fn is_object_or_array(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::Object(_) | serde_json::Value::Array(_))
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
