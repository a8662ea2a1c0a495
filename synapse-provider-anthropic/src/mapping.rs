//! Conversions between `synapse_types`'s provider-agnostic data model and
//! the Anthropic wire format defined in [`crate::types`].

use synapse_types::{
    CompletionRequest, ContentBlock, ContentItem, ImageSource, Message, Role, StopReason,
    SystemPrompt, ToolChoice, ToolDefinition, TokenUsage,
};

use crate::types::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage,
    AnthropicRequest, AnthropicThinking, AnthropicTool, AnthropicToolChoice,
    AnthropicToolResultContent, AnthropicUsage,
};

/// Builds an [`AnthropicRequest`] from a provider-agnostic [`CompletionRequest`].
///
/// `default_model` is used when `request.model` is empty, matching the loop's
/// convention of leaving model selection to the provider by default.
pub(crate) fn build_request(
    request: &CompletionRequest,
    default_model: &str,
    stream: bool,
) -> AnthropicRequest {
    AnthropicRequest {
        model: if request.model.is_empty() { default_model.to_string() } else { request.model.clone() },
        max_tokens: request.max_tokens.unwrap_or(4096) as u32,
        messages: request.messages.iter().map(message_to_anthropic).collect(),
        system: request.system.as_ref().map(system_prompt_to_text),
        tools: request.tools.iter().map(tool_definition_to_anthropic).collect(),
        temperature: request.temperature,
        thinking: request.thinking.as_ref().map(thinking_config_to_anthropic),
        tool_choice: request.tool_choice.as_ref().map(tool_choice_to_anthropic),
        stream,
    }
}

/// Flattens a [`SystemPrompt`] to the plain string Anthropic's wire format
/// expects. Per-block `cache_control` hints have no representation in this
/// subset of the API and are dropped.
fn system_prompt_to_text(system: &SystemPrompt) -> String {
    match system {
        SystemPrompt::Text(text) => text.clone(),
        SystemPrompt::Blocks(blocks) => {
            blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("\n\n")
        }
    }
}

fn thinking_config_to_anthropic(thinking: &synapse_types::ThinkingConfig) -> AnthropicThinking {
    match thinking {
        synapse_types::ThinkingConfig::Enabled { budget_tokens } => {
            AnthropicThinking::Enabled { budget_tokens: *budget_tokens }
        }
        synapse_types::ThinkingConfig::Disabled => AnthropicThinking::Disabled,
    }
}

fn tool_choice_to_anthropic(choice: &ToolChoice) -> AnthropicToolChoice {
    match choice {
        ToolChoice::Auto => AnthropicToolChoice::Auto,
        ToolChoice::None => AnthropicToolChoice::None,
        ToolChoice::Required => AnthropicToolChoice::Any,
        ToolChoice::Specific { name } => AnthropicToolChoice::Tool { name: name.clone() },
    }
}

fn tool_definition_to_anthropic(def: &ToolDefinition) -> AnthropicTool {
    AnthropicTool {
        name: def.name.clone(),
        description: def.description.clone(),
        input_schema: def.input_schema.clone(),
    }
}

/// Anthropic only recognizes `"user"` and `"assistant"` roles; tool-result
/// messages (our [`Role::Tool`]) travel back as a `user`-role message whose
/// content is `tool_result` blocks, and a bare `Role::System` message (which
/// the loop never constructs — system prompts go through
/// [`CompletionRequest::system`]) falls back to `user` rather than panicking.
fn role_to_anthropic(role: Role) -> &'static str {
    match role {
        Role::Assistant => "assistant",
        Role::User | Role::Tool | Role::System => "user",
    }
}

fn message_to_anthropic(message: &Message) -> AnthropicMessage {
    AnthropicMessage {
        role: role_to_anthropic(message.role).to_string(),
        content: AnthropicContent::Blocks(message.content.iter().map(content_block_to_anthropic).collect()),
    }
}

fn content_block_to_anthropic(block: &ContentBlock) -> AnthropicContentBlock {
    match block {
        ContentBlock::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
        ContentBlock::Thinking { content, signature } => {
            AnthropicContentBlock::Thinking { thinking: content.clone(), signature: signature.clone() }
        }
        ContentBlock::ToolUse { id, name, input } => {
            AnthropicContentBlock::ToolUse { id: id.clone(), name: name.clone(), input: input.clone() }
        }
        ContentBlock::ToolResult { tool_use_id, content, is_error } => AnthropicContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.iter().map(content_item_to_anthropic).collect(),
            is_error: *is_error,
        },
        ContentBlock::SkillSearch { query, results } => AnthropicContentBlock::Text {
            text: format!("Skill search for \"{query}\" found: {}", results.join(", ")),
        },
        ContentBlock::ContextSummary { summary, .. } => AnthropicContentBlock::Text { text: summary.clone() },
        ContentBlock::Other => AnthropicContentBlock::Text { text: String::new() },
    }
}

fn content_item_to_anthropic(item: &ContentItem) -> AnthropicToolResultContent {
    match item {
        ContentItem::Text(text) => AnthropicToolResultContent::Text { text: text.clone() },
        ContentItem::Image { source } => {
            AnthropicToolResultContent::Image { source: image_source_to_anthropic(source) }
        }
    }
}

fn image_source_to_anthropic(source: &ImageSource) -> AnthropicImageSource {
    match source {
        ImageSource::Base64 { media_type, data } => {
            AnthropicImageSource::Base64 { media_type: media_type.clone(), data: data.clone() }
        }
        ImageSource::Url { url } => AnthropicImageSource::Url { url: url.clone() },
    }
}

/// Converts a completed response's content blocks back into our model.
///
/// `tool_result` and `image` blocks never appear in an assistant response
/// (they're things we send, not things the model returns); they map to
/// [`ContentBlock::Other`] rather than being dropped silently, so a
/// malformed or unexpected response is still visible in the message.
pub(crate) fn anthropic_block_to_content_block(block: AnthropicContentBlock) -> ContentBlock {
    match block {
        AnthropicContentBlock::Text { text } => ContentBlock::Text { text },
        AnthropicContentBlock::Thinking { thinking, signature } => {
            ContentBlock::Thinking { content: thinking, signature }
        }
        AnthropicContentBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
        AnthropicContentBlock::ToolResult { .. } | AnthropicContentBlock::Image { .. } => ContentBlock::Other,
    }
}

/// Maps Anthropic's `stop_reason` string onto our [`StopReason`]. Anthropic's
/// `"stop_sequence"` has no counterpart in our reduced set and is treated as
/// a normal end of turn.
pub(crate) fn stop_reason_from_anthropic(reason: &str) -> StopReason {
    match reason {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

pub(crate) fn anthropic_usage_to_token_usage(usage: AnthropicUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.input_tokens as usize,
        output_tokens: usage.output_tokens as usize,
        cache_read_tokens: usage.cache_read_input_tokens.map(|v| v as usize),
        cache_creation_tokens: usage.cache_creation_input_tokens.map(|v| v as usize),
    }
}
