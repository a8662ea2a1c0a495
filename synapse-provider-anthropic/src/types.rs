//! Anthropic Messages API request/response wire types.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages>

use serde::{Deserialize, Serialize};

/// Anthropic API request body.
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Conversation messages.
    pub messages: Vec<AnthropicMessage>,
    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Tools available to the model.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Extended thinking configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<AnthropicThinking>,
    /// Which tool (if any) the model must use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
    /// Whether to stream the response over SSE.
    pub stream: bool,
}

/// Tool-choice constraint in the Anthropic API format.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicToolChoice {
    /// The model decides whether and which tool to call.
    Auto,
    /// The model must call some tool, but may pick which.
    Any,
    /// The model must call the named tool.
    Tool {
        /// The required tool's name.
        name: String,
    },
    /// The model must not call any tool.
    None,
}

/// Extended-thinking config in the Anthropic API format.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicThinking {
    /// Thinking enabled with a token budget.
    Enabled {
        /// Maximum tokens the model may spend thinking.
        budget_tokens: usize,
    },
    /// Thinking disabled.
    Disabled,
}

/// A message in the Anthropic API format.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role: "user" or "assistant".
    pub role: String,
    /// Message content.
    pub content: AnthropicContent,
}

/// Content can be a string or array of content blocks.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    /// Simple text string.
    Text(String),
    /// Array of content blocks.
    Blocks(Vec<AnthropicContentBlock>),
}

/// A content block in the Anthropic API format.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    /// Text content.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },
    /// Extended-thinking content.
    #[serde(rename = "thinking")]
    Thinking {
        /// The thinking text.
        thinking: String,
        /// Cryptographic signature, present once the block is complete.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Tool use request.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Tool use identifier.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input parameters.
        input: serde_json::Value,
    },
    /// Tool result.
    #[serde(rename = "tool_result")]
    ToolResult {
        /// The tool use ID this result is for.
        tool_use_id: String,
        /// The result content.
        content: Vec<AnthropicToolResultContent>,
        /// Whether this result represents an error.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Image content.
    #[serde(rename = "image")]
    Image {
        /// Image source.
        source: AnthropicImageSource,
    },
}

/// An item inside a `tool_result` block's content array.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicToolResultContent {
    /// Text content.
    #[serde(rename = "text")]
    Text {
        /// The text.
        text: String,
    },
    /// Image content.
    #[serde(rename = "image")]
    Image {
        /// Image source.
        source: AnthropicImageSource,
    },
}

/// Image source in Anthropic API format.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicImageSource {
    /// Base64-encoded image.
    #[serde(rename = "base64")]
    Base64 {
        /// MIME type (e.g. `"image/png"`).
        media_type: String,
        /// Base64 data.
        data: String,
    },
    /// URL-referenced image.
    #[serde(rename = "url")]
    Url {
        /// Image URL.
        url: String,
    },
}

/// Tool definition for the Anthropic API.
#[derive(Debug, Serialize)]
pub struct AnthropicTool {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for the tool input.
    pub input_schema: serde_json::Value,
}

/// Anthropic API non-streaming response body.
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// Provider-assigned message id.
    pub id: String,
    /// Response content blocks.
    pub content: Vec<AnthropicContentBlock>,
    /// Model that generated the response.
    pub model: String,
    /// Stop reason.
    pub stop_reason: String,
    /// Token usage.
    pub usage: AnthropicUsage,
}

/// Token usage from the Anthropic API.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnthropicUsage {
    /// Input tokens used.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Cache read tokens (prompt caching).
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    /// Cache creation tokens (prompt caching).
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
}

/// Body of a non-2xx response from the Anthropic API.
#[derive(Debug, Deserialize)]
pub struct AnthropicErrorResponse {
    /// The nested error payload.
    pub error: AnthropicErrorBody,
}

/// The `error` object of [`AnthropicErrorResponse`].
#[derive(Debug, Deserialize)]
pub struct AnthropicErrorBody {
    /// Anthropic's error type tag, e.g. `"rate_limit_error"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable error message.
    pub message: String,
}

/// One `data:` payload from the Anthropic streaming Messages API.
///
/// Tagged on `type`; variants this client doesn't act on (`ping`,
/// `content_block_stop`) still parse so an unrecognized-but-well-formed
/// event never aborts the stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// The response envelope, with an initially-empty message.
    MessageStart {
        /// The partial response, including `id` and `model`.
        message: AnthropicStreamMessageStart,
    },
    /// A new content block has started at `index`.
    ContentBlockStart {
        /// The block's position in the response's content array.
        index: usize,
        /// The block's initial (possibly empty) state.
        content_block: AnthropicContentBlock,
    },
    /// An incremental update to the content block at `index`.
    ContentBlockDelta {
        /// The block's position in the response's content array.
        index: usize,
        /// The incremental update.
        delta: AnthropicDelta,
    },
    /// The content block at `index` is complete.
    ContentBlockStop {
        /// The block's position in the response's content array.
        index: usize,
    },
    /// Top-level response metadata delta (stop reason, usage).
    MessageDelta {
        /// The incremental update to top-level fields.
        delta: AnthropicMessageDelta,
        /// Usage accumulated so far.
        usage: AnthropicUsage,
    },
    /// The response is complete.
    MessageStop,
    /// Keep-alive; carries no data.
    Ping,
    /// A stream-level error (distinct from an HTTP-level error response).
    Error {
        /// The error payload.
        error: AnthropicErrorBody,
    },
}

/// The partial response envelope carried by `message_start`.
#[derive(Debug, Deserialize)]
pub struct AnthropicStreamMessageStart {
    /// Provider-assigned message id.
    pub id: String,
    /// Model that is generating the response.
    pub model: String,
    /// Usage so far (typically just input tokens at this point).
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// An incremental delta within a `content_block_delta` event.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicDelta {
    /// Incremental plain text.
    TextDelta {
        /// The text chunk.
        text: String,
    },
    /// Incremental thinking text.
    ThinkingDelta {
        /// The thinking chunk.
        thinking: String,
    },
    /// The thinking block's trailing signature, sent as its own delta.
    SignatureDelta {
        /// The signature chunk.
        signature: String,
    },
    /// Incremental partial JSON for an in-progress `tool_use` block's input.
    InputJsonDelta {
        /// The raw JSON chunk (concatenate across deltas, then parse).
        partial_json: String,
    },
}

/// Top-level fields delivered incrementally via `message_delta`.
#[derive(Debug, Deserialize)]
pub struct AnthropicMessageDelta {
    /// The stop reason, once known.
    #[serde(default)]
    pub stop_reason: Option<String>,
}
