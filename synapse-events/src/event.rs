//! The `AgentEvent` union and its discriminant `EventKind`.

use serde::{Deserialize, Serialize};
use synapse_types::TokenUsage;

/// One observable moment in an agent run, emitted on the [`crate::EventStream`]
/// in the order described by `EventStream`'s ordering guarantees.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The run has begun.
    AgentStart,
    /// A new turn has begun. `turn_index` is strictly increasing across turns.
    TurnStart {
        /// Zero-indexed turn number.
        turn_index: usize,
    },
    /// The model has begun streaming a message.
    MessageStart,
    /// An incremental text delta within the current message.
    MessageDelta {
        /// The text delta.
        text: String,
    },
    /// The current message is complete.
    MessageEnd,
    /// An incremental reasoning/thinking delta.
    Thinking {
        /// The thinking text delta.
        text: String,
    },
    /// A tool call is about to execute.
    ToolStart {
        /// The tool call's unique id.
        call_id: String,
        /// The tool's name.
        name: String,
        /// The tool's input.
        input: serde_json::Value,
    },
    /// A tool call has finished.
    ToolEnd {
        /// The tool call's unique id, matching a prior `ToolStart`.
        call_id: String,
        /// The tool's rendered text output.
        output: String,
        /// Whether the tool reported an error.
        is_error: bool,
    },
    /// Token usage for the turn just completed.
    Usage(TokenUsage),
    /// The Context Orchestrator offloaded or compacted history.
    ContextManagement {
        /// Which action the orchestrator took.
        action: ContextAction,
        /// Human-readable detail (counts, token estimates).
        details: String,
    },
    /// The TodoReminder Strategy injected a reminder message.
    TodoReminder {
        /// Number of open todo items at the time of the reminder.
        open_count: usize,
    },
    /// The turn just completed.
    TurnEnd,
    /// A recoverable or fatal error occurred.
    Error {
        /// The error's rendered message.
        error: String,
        /// Whether the loop can continue past this error.
        recoverable: bool,
    },
    /// The run has finished. Always the last event on the stream.
    AgentEnd {
        /// The final text response.
        result: String,
        /// Cumulative token usage across the run.
        usage: TokenUsage,
    },
    /// A Stop-Hook returned data to surface, after the run has already
    /// ended. Emitted on the [`crate::EventBus`] only — the stream itself
    /// is already closed by the time stop hooks run.
    StopHook {
        /// The hook's registered name.
        name: String,
        /// Arbitrary data the hook returned, if any.
        data: Option<serde_json::Value>,
    },
}

/// Which action the Context Orchestrator took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextAction {
    /// A message body was moved to offload storage and replaced by a pointer.
    Offload,
    /// A run of messages was summarized and replaced by a summary block.
    Compact,
}

/// The discriminant of an [`AgentEvent`], used as the [`crate::EventBus`]
/// subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// See [`AgentEvent::AgentStart`].
    AgentStart,
    /// See [`AgentEvent::TurnStart`].
    TurnStart,
    /// See [`AgentEvent::MessageStart`].
    MessageStart,
    /// See [`AgentEvent::MessageDelta`].
    MessageDelta,
    /// See [`AgentEvent::MessageEnd`].
    MessageEnd,
    /// See [`AgentEvent::Thinking`].
    Thinking,
    /// See [`AgentEvent::ToolStart`].
    ToolStart,
    /// See [`AgentEvent::ToolEnd`].
    ToolEnd,
    /// See [`AgentEvent::Usage`].
    Usage,
    /// See [`AgentEvent::ContextManagement`].
    ContextManagement,
    /// See [`AgentEvent::TodoReminder`].
    TodoReminder,
    /// See [`AgentEvent::TurnEnd`].
    TurnEnd,
    /// See [`AgentEvent::Error`].
    Error,
    /// See [`AgentEvent::AgentEnd`].
    AgentEnd,
    /// See [`AgentEvent::StopHook`].
    StopHook,
}

impl AgentEvent {
    /// This event's discriminant.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AgentStart => EventKind::AgentStart,
            Self::TurnStart { .. } => EventKind::TurnStart,
            Self::MessageStart => EventKind::MessageStart,
            Self::MessageDelta { .. } => EventKind::MessageDelta,
            Self::MessageEnd => EventKind::MessageEnd,
            Self::Thinking { .. } => EventKind::Thinking,
            Self::ToolStart { .. } => EventKind::ToolStart,
            Self::ToolEnd { .. } => EventKind::ToolEnd,
            Self::Usage(_) => EventKind::Usage,
            Self::ContextManagement { .. } => EventKind::ContextManagement,
            Self::TodoReminder { .. } => EventKind::TodoReminder,
            Self::TurnEnd => EventKind::TurnEnd,
            Self::Error { .. } => EventKind::Error,
            Self::AgentEnd { .. } => EventKind::AgentEnd,
            Self::StopHook { .. } => EventKind::StopHook,
        }
    }

    /// Whether this event terminates the stream (§4.2 contract (b)).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AgentEnd { .. } | Self::Error { .. })
    }
}
