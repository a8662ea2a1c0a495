//! SSE streaming support for the Anthropic Messages API.
//!
//! Parses the Server-Sent Events stream Anthropic emits with
//! `"stream": true` and maps it onto [`synapse_types::StreamEvent`],
//! assembling the final [`synapse_types::Message`] incrementally so it can
//! be emitted once the stream completes.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages-streaming>

use std::collections::BTreeMap;

use futures::StreamExt;
use reqwest::Response;
use synapse_types::{
    ContentBlock, Message, Role, StreamError, StreamEvent, StreamHandle, TokenUsage,
};

use crate::mapping::anthropic_usage_to_token_usage;
use crate::types::{AnthropicContentBlock, AnthropicDelta, AnthropicStreamEvent};

/// Channel capacity for the event stream. Deltas are small and consumed
/// promptly by the loop's event emitter; this is generous headroom rather
/// than a tuned backpressure limit.
const CHANNEL_CAPACITY: usize = 64;

/// Drive `response`'s SSE body to completion, forwarding [`StreamEvent`]s on
/// a channel and returning a [`StreamHandle`] immediately.
pub(crate) fn stream_completion(response: Response) -> StreamHandle {
    let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
    let join = Box::pin(async move {
        drive(response, tx).await;
    });
    StreamHandle { receiver: rx, join }
}

async fn drive(response: Response, tx: tokio::sync::mpsc::Sender<StreamEvent>) {
    let mut byte_stream = response.bytes_stream();
    let mut line_buf = String::new();
    let mut data_buf = String::new();
    let mut state = AssemblyState::default();

    loop {
        let chunk = match byte_stream.next().await {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                let _ = tx.send(StreamEvent::Error(StreamError::retryable(format!("stream read error: {e}")))).await;
                return;
            }
            None => break,
        };
        let chunk_str = match std::str::from_utf8(&chunk) {
            Ok(s) => s,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(StreamError::non_retryable(format!("UTF-8 decode error: {e}"))))
                    .await;
                return;
            }
        };
        line_buf.push_str(chunk_str);

        while let Some(pos) = line_buf.find('\n') {
            let line = line_buf[..pos].trim_end_matches('\r').to_string();
            line_buf.drain(..=pos);

            if let Some(rest) = line.strip_prefix("data:") {
                if !data_buf.is_empty() {
                    data_buf.push('\n');
                }
                data_buf.push_str(rest.trim_start());
            } else if line.is_empty() && !data_buf.is_empty() {
                let data = std::mem::take(&mut data_buf);
                if dispatch(&data, &mut state, &tx).await {
                    return;
                }
            }
        }
    }

    if !data_buf.is_empty() {
        dispatch(&data_buf, &mut state, &tx).await;
    }
}

/// Parses one `data:` payload and advances `state`, emitting any resulting
/// [`StreamEvent`]s. Returns `true` when the stream is logically finished
/// (fatal error or `message_stop`) and the caller should stop reading.
async fn dispatch(
    data: &str,
    state: &mut AssemblyState,
    tx: &tokio::sync::mpsc::Sender<StreamEvent>,
) -> bool {
    let event: AnthropicStreamEvent = match serde_json::from_str(data) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, payload = %data, "skipping unparseable anthropic SSE event");
            return false;
        }
    };

    match event {
        AnthropicStreamEvent::MessageStart { message } => {
            state.id = message.id;
            state.model = message.model;
            false
        }
        AnthropicStreamEvent::ContentBlockStart { index, content_block } => {
            state.blocks.insert(index, BlockBuilder::from_initial(content_block));
            false
        }
        AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
            let Some(builder) = state.blocks.get_mut(&index) else { return false };
            match delta {
                AnthropicDelta::TextDelta { text } => {
                    builder.push_text(&text);
                    let _ = tx.send(StreamEvent::TextDelta(text)).await;
                }
                AnthropicDelta::ThinkingDelta { thinking } => {
                    builder.push_thinking(&thinking);
                    let _ = tx.send(StreamEvent::ThinkingDelta(thinking)).await;
                }
                AnthropicDelta::SignatureDelta { signature } => builder.push_signature(&signature),
                AnthropicDelta::InputJsonDelta { partial_json } => builder.push_json(&partial_json),
            }
            false
        }
        AnthropicStreamEvent::ContentBlockStop { .. } => false,
        AnthropicStreamEvent::MessageDelta { delta, usage } => {
            if let Some(reason) = delta.stop_reason {
                state.stop_reason = Some(reason);
            }
            state.usage = Some(usage);
            let _ = tx.send(StreamEvent::Usage(anthropic_usage_to_token_usage(usage))).await;
            false
        }
        AnthropicStreamEvent::MessageStop => {
            let message = state.finish();
            let _ = tx.send(StreamEvent::MessageComplete(message)).await;
            true
        }
        AnthropicStreamEvent::Ping => false,
        AnthropicStreamEvent::Error { error } => {
            let _ = tx.send(StreamEvent::Error(StreamError::retryable(error.message))).await;
            true
        }
    }
}

#[derive(Default)]
struct AssemblyState {
    id: String,
    model: String,
    blocks: BTreeMap<usize, BlockBuilder>,
    stop_reason: Option<String>,
    usage: Option<crate::types::AnthropicUsage>,
}

impl AssemblyState {
    fn finish(&mut self) -> Message {
        let content = std::mem::take(&mut self.blocks)
            .into_values()
            .map(BlockBuilder::into_content_block)
            .collect();
        Message { role: Role::Assistant, content }
    }
}

enum BlockBuilder {
    Text(String),
    Thinking { content: String, signature: Option<String> },
    ToolUse { id: String, name: String, json: String },
    Other,
}

impl BlockBuilder {
    fn from_initial(block: AnthropicContentBlock) -> Self {
        match block {
            AnthropicContentBlock::Text { text } => Self::Text(text),
            AnthropicContentBlock::Thinking { thinking, signature } => {
                Self::Thinking { content: thinking, signature }
            }
            AnthropicContentBlock::ToolUse { id, name, input } => Self::ToolUse {
                id,
                name,
                json: if input.is_null() { String::new() } else { input.to_string() },
            },
            AnthropicContentBlock::ToolResult { .. } | AnthropicContentBlock::Image { .. } => Self::Other,
        }
    }

    fn push_text(&mut self, delta: &str) {
        if let Self::Text(buf) = self {
            buf.push_str(delta);
        }
    }

    fn push_thinking(&mut self, delta: &str) {
        if let Self::Thinking { content, .. } = self {
            content.push_str(delta);
        }
    }

    fn push_signature(&mut self, delta: &str) {
        if let Self::Thinking { signature, .. } = self {
            signature.get_or_insert_with(String::new).push_str(delta);
        }
    }

    fn push_json(&mut self, delta: &str) {
        if let Self::ToolUse { json, .. } = self {
            json.push_str(delta);
        }
    }

    fn into_content_block(self) -> ContentBlock {
        match self {
            Self::Text(text) => ContentBlock::Text { text },
            Self::Thinking { content, signature } => ContentBlock::Thinking { content, signature },
            Self::ToolUse { id, name, json } => {
                let input = if json.trim().is_empty() {
                    serde_json::Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&json).unwrap_or(serde_json::Value::Object(serde_json::Map::new()))
                };
                ContentBlock::ToolUse { id, name, input }
            }
            Self::Other => ContentBlock::Other,
        }
    }
}

fn _assert_usage_helper_used() -> TokenUsage {
    anthropic_usage_to_token_usage(crate::types::AnthropicUsage {
        input_tokens: 0,
        output_tokens: 0,
        cache_read_input_tokens: None,
        cache_creation_input_tokens: None,
    })
}
