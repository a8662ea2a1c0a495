//! Streaming completion types.

use serde::{Deserialize, Serialize};

use crate::types::{Message, TokenUsage};
use crate::wasm::WasmBoxedFuture;

/// One event in a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// An incremental text delta.
    TextDelta(String),
    /// An incremental thinking delta.
    ThinkingDelta(String),
    /// Usage statistics, typically sent once near the end of the stream.
    Usage(TokenUsage),
    /// The fully assembled message, sent when the stream completes.
    MessageComplete(Message),
    /// A stream-level error.
    Error(StreamError),
}

/// An error encountered mid-stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamError {
    /// Human-readable message.
    pub message: String,
    /// Whether the caller may retry the stream from scratch.
    pub retryable: bool,
}

impl StreamError {
    /// Construct a retryable stream error.
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Construct a non-retryable stream error.
    #[must_use]
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StreamError {}

/// A handle to an in-flight streamed completion.
pub struct StreamHandle {
    /// Receiver side of the event channel.
    pub receiver: tokio::sync::mpsc::Receiver<StreamEvent>,
    /// Future that resolves once the stream task has fully shut down.
    /// Most callers can drop this; it exists so tests can await clean exit.
    pub join: WasmBoxedFuture<'static, ()>,
}
