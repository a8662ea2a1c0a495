//! Message and content-block data model, plus provider request/response types.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::wasm::{WasmCompatSend, WasmCompatSync};

/// The role of a message author.
///
/// `Tool` exists for forward compatibility with providers that emit a
/// dedicated tool role; this core always appends tool results as a `User`
/// message per the agent loop's algorithm (see [`ContentBlock::ToolResult`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A human user, or a synthetic message the loop injects on the user's
    /// behalf (tool results, reminders).
    User,
    /// The model.
    Assistant,
    /// A system-level instruction.
    System,
    /// Reserved for providers that model tool results as their own role.
    Tool,
}

/// A content block within a message.
///
/// Tagged by `type` so unknown blocks from a newer provider round-trip
/// instead of failing to deserialize: the `Other` variant captures whatever
/// JSON doesn't match a known shape. See Design Notes — "unknown variants
/// MUST be logged and skipped, not crashed on."
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Opaque reasoning trace from an extended-thinking model.
    Thinking {
        /// The thinking text.
        content: String,
        /// Cryptographic signature for verification, if the provider signs it.
        signature: Option<String>,
    },
    /// A model-issued tool invocation. `id` is unique within the turn (I3).
    ToolUse {
        /// Unique identifier for this call.
        id: String,
        /// Name of the tool to invoke.
        name: String,
        /// JSON input arguments. Validated object-shaped by the Message
        /// Validator before the block is allowed into history.
        input: serde_json::Value,
    },
    /// The paired reply to a [`ContentBlock::ToolUse`].
    ToolResult {
        /// References the `id` of the corresponding `ToolUse`.
        tool_use_id: String,
        /// Result content items.
        content: Vec<ContentItem>,
        /// Whether this result represents an error.
        is_error: bool,
    },
    /// A skill-search meta-instruction result, serialized to text for the LLM.
    SkillSearch {
        /// The query that was searched.
        query: String,
        /// Matching skill names/descriptions, already rendered to text.
        results: Vec<String>,
    },
    /// A context-compaction summary produced by the Context Orchestrator.
    ContextSummary {
        /// The summary text replacing the compacted messages.
        summary: String,
        /// Number of messages folded into this summary.
        compacted_count: usize,
    },
    /// Escape hatch for forward compatibility: any block shape not matched
    /// above deserializes here instead of failing the whole message.
    #[serde(other)]
    Other,
}

impl ContentBlock {
    /// Construct a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Construct a tool-use block.
    #[must_use]
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Construct a successful tool-result block.
    #[must_use]
    pub fn tool_result(tool_use_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: vec![ContentItem::Text(text.into())],
            is_error: false,
        }
    }

    /// Construct an error tool-result block.
    #[must_use]
    pub fn tool_error(tool_use_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: vec![ContentItem::Text(text.into())],
            is_error: true,
        }
    }

    /// The plain-text rendering of this block, if it has one. Used by the
    /// History Sanitizer and Context Orchestrator to size messages without
    /// caring about block-specific structure.
    #[must_use]
    pub fn text_body(&self) -> Option<String> {
        match self {
            Self::Text { text } => Some(text.clone()),
            Self::Thinking { content, .. } => Some(content.clone()),
            Self::ToolResult { content, .. } => Some(
                content
                    .iter()
                    .filter_map(ContentItem::as_text)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Self::ContextSummary { summary, .. } => Some(summary.clone()),
            _ => None,
        }
    }
}

/// A content item within a tool result (text or image).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Plain text.
    Text(String),
    /// An image.
    Image {
        /// The image source.
        source: ImageSource,
    },
}

impl ContentItem {
    /// Borrow the text, if this item is a text item.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t.as_str()),
            Self::Image { .. } => None,
        }
    }
}

/// Source of an image content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// Base64-encoded image data.
    Base64 {
        /// MIME type (e.g. `"image/png"`).
        media_type: String,
        /// Base64-encoded data.
        data: String,
    },
    /// URL to an image.
    Url {
        /// The image URL.
        url: String,
    },
}

/// A message in a conversation history.
///
/// Append-only within a session until an explicit rewrite (compact or
/// sanitize) replaces the file atomically — see `synapse-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// The content blocks of this message.
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message with a single text content block.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with a single text content block.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create a system message with a single text content block.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create the single `User` message the loop appends after executing a
    /// turn's tool calls — the content is the ordered list of tool results.
    #[must_use]
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: blocks,
        }
    }

    /// Iterate the `tool_use` blocks in this message, in content order.
    /// This is the accessor for what the distilled data model calls the
    /// optional `toolCalls` on assistant messages — derived on demand
    /// instead of duplicated in a second field, so it can never drift out
    /// of sync with `content`.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    /// Whether this message carries at least one tool-use block.
    #[must_use]
    pub fn has_tool_uses(&self) -> bool {
        self.content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }

    /// Concatenate all plain-text blocks, in order, separated by newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// --- Completion request/response types ---

/// System prompt configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemPrompt {
    /// A simple text system prompt.
    Text(String),
    /// Structured system prompt blocks with optional cache control.
    Blocks(Vec<SystemBlock>),
}

impl From<String> for SystemPrompt {
    fn from(s: String) -> Self {
        SystemPrompt::Text(s)
    }
}

impl From<&str> for SystemPrompt {
    fn from(s: &str) -> Self {
        SystemPrompt::Text(s.to_string())
    }
}

/// A block within a structured system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    /// The text content of this block.
    pub text: String,
    /// Optional cache control for this block.
    pub cache_control: Option<CacheControl>,
}

/// Cache control configuration for prompt caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheControl {
    /// Time-to-live for the cached content.
    pub ttl: Option<CacheTtl>,
}

/// Cache time-to-live options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CacheTtl {
    /// Cache for 5 minutes.
    FiveMinutes,
    /// Cache for 1 hour.
    OneHour,
}

/// Tool selection strategy for the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolChoice {
    /// Model decides whether to use tools.
    Auto,
    /// Model must not use tools.
    None,
    /// Model must use at least one tool.
    Required,
    /// Model must use the specified tool.
    Specific {
        /// Name of the required tool.
        name: String,
    },
}

/// Extended thinking configuration for reasoning models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ThinkingConfig {
    /// Enable thinking with a token budget.
    Enabled {
        /// Maximum tokens for thinking.
        budget_tokens: usize,
    },
    /// Disable thinking.
    Disabled,
}

/// A completion request to an LLM provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model identifier.
    pub model: String,
    /// The conversation messages.
    pub messages: Vec<Message>,
    /// Optional system prompt.
    pub system: Option<SystemPrompt>,
    /// Tool definitions available to the model.
    pub tools: Vec<ToolDefinition>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Tool selection strategy.
    pub tool_choice: Option<ToolChoice>,
    /// Extended thinking configuration.
    pub thinking: Option<ThinkingConfig>,
}

/// A completion response from an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Provider-assigned message ID.
    pub id: String,
    /// The model that generated this response.
    pub model: String,
    /// The response message.
    pub message: Message,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Why the model stopped generating.
    pub stop_reason: StopReason,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Model reached a natural end.
    EndTurn,
    /// Model wants to use a tool.
    ToolUse,
    /// Hit the max token limit.
    MaxTokens,
    /// Server paused to compact context (§4.5 "Forced compact").
    Compaction,
}

/// Token usage statistics for a completion, accumulated per LLM round.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens that are not cache reads/writes.
    pub input_tokens: usize,
    /// Output tokens.
    pub output_tokens: usize,
    /// Tokens read from a prompt cache.
    pub cache_read_tokens: Option<usize>,
    /// Tokens written to a prompt cache.
    pub cache_creation_tokens: Option<usize>,
}

impl TokenUsage {
    /// Add another round's usage into this running tally.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens = Some(
            self.cache_read_tokens.unwrap_or(0) + other.cache_read_tokens.unwrap_or(0),
        );
        self.cache_creation_tokens = Some(
            self.cache_creation_tokens.unwrap_or(0) + other.cache_creation_tokens.unwrap_or(0),
        );
    }
}

// --- Tool definition types ---

/// Definition of a tool available to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (unique identifier).
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: serde_json::Value,
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Human-readable content items.
    pub content: Vec<ContentItem>,
    /// Whether this output represents an error.
    pub is_error: bool,
    /// Free-form metadata the tool wants surfaced on the event bus.
    pub metadata: Option<serde_json::Value>,
}

impl ToolOutput {
    /// Build a successful text output.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text(text.into())],
            is_error: false,
            metadata: None,
        }
    }

    /// Build an error text output.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text(text.into())],
            is_error: true,
            metadata: None,
        }
    }

    /// Flatten content to a single text string for use in a `ToolResult` block.
    #[must_use]
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runtime context provided to tools during execution.
pub struct ToolContext {
    /// Current working directory.
    pub cwd: PathBuf,
    /// Session identifier.
    pub session_id: String,
    /// Environment variables available to the tool.
    pub environment: HashMap<String, String>,
    /// Token for cooperative cancellation.
    pub cancellation_token: CancellationToken,
    /// Optional progress reporter for long-running tools.
    pub progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/tmp")),
            session_id: String::new(),
            environment: HashMap::new(),
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }
}

/// Reports progress for long-running tool operations.
pub trait ProgressReporter: WasmCompatSend + WasmCompatSync {
    /// Report progress.
    fn report(&self, progress: f64, total: Option<f64>, message: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_uses_derives_from_content_not_a_stored_field() {
        let msg = Message {
            role: Role::Assistant,
            content: vec![
                ContentBlock::text("let me check"),
                ContentBlock::tool_use("call_1", "read_file", serde_json::json!({"path": "a.rs"})),
            ],
        };
        let uses: Vec<_> = msg.tool_uses().collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].0, "call_1");
        assert_eq!(uses[0].1, "read_file");
        assert!(msg.has_tool_uses());
    }

    #[test]
    fn unknown_content_block_deserializes_to_other() {
        let value = serde_json::json!({"type": "future_block_kind", "whatever": 1});
        let block: ContentBlock = serde_json::from_value(value).expect("unknown tags must not fail");
        assert!(matches!(block, ContentBlock::Other));
    }

    #[test]
    fn tool_result_round_trips_through_json() {
        let block = ContentBlock::tool_error("call_1", "boom");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        let back: ContentBlock = serde_json::from_value(json).unwrap();
        match back {
            ContentBlock::ToolResult { is_error, .. } => assert!(is_error),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn message_text_concatenates_only_text_blocks() {
        let msg = Message {
            role: Role::Assistant,
            content: vec![
                ContentBlock::text("first"),
                ContentBlock::tool_use("call_1", "noop", serde_json::json!({})),
                ContentBlock::text("second"),
            ],
        };
        assert_eq!(msg.text(), "first\nsecond");
    }
}
