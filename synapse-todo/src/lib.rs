#![deny(missing_docs)]
//! Todo tracking and the reminder strategy that nudges the model when it
//! tries to stop with work still outstanding.

use serde::{Deserialize, Serialize};
use synapse_types::Message;

/// Status of a single todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not yet started.
    Pending,
    /// Currently being worked.
    InProgress,
    /// Finished.
    Completed,
}

/// A single todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Short description of the task.
    pub content: String,
    /// Current status.
    pub status: TodoStatus,
}

/// The model's current task list, replaced wholesale whenever the model
/// issues a todo-write tool call.
#[derive(Debug, Clone, Default)]
pub struct TodoStore {
    items: Vec<TodoItem>,
}

impl TodoStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire list. Returns `true` if the list actually
    /// changed, so callers can reset "turns since last update".
    pub fn set(&mut self, items: Vec<TodoItem>) -> bool {
        let changed = !items_equal(&self.items, &items);
        self.items = items;
        changed
    }

    /// The current items.
    #[must_use]
    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    /// Whether at least one item is not yet completed.
    #[must_use]
    pub fn has_open_items(&self) -> bool {
        self.items.iter().any(|i| i.status != TodoStatus::Completed)
    }

    /// Items that are not yet completed, in list order.
    pub fn open_items(&self) -> impl Iterator<Item = &TodoItem> {
        self.items.iter().filter(|i| i.status != TodoStatus::Completed)
    }
}

fn items_equal(a: &[TodoItem], b: &[TodoItem]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.content == y.content && x.status == y.status)
}

/// Whether the reminder strategy wants to inject a message, and what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderDecision {
    /// Nothing to remind about right now.
    NoReminder,
    /// Inject this text as a synthetic user message.
    Remind {
        /// The reminder text, including the `[System Reminder]` header.
        text: String,
    },
}

/// Tracks turns since the todo list last changed and decides, at the
/// point the model tries to stop, whether to nudge it back to work.
///
/// Never forces loop continuation itself — it only supplies text. The
/// Agent Loop is the one that decides to append it and re-enter the loop.
#[derive(Debug, Clone)]
pub struct TodoReminderStrategy {
    stale_threshold_turns: u32,
    turns_since_last_update: u32,
}

impl TodoReminderStrategy {
    /// Default staleness threshold, in turns.
    pub const DEFAULT_STALE_THRESHOLD_TURNS: u32 = 5;

    /// Create a strategy with a custom staleness threshold.
    #[must_use]
    pub fn new(stale_threshold_turns: u32) -> Self {
        Self {
            stale_threshold_turns,
            turns_since_last_update: 0,
        }
    }

    /// Call once per completed turn. Pass whether [`TodoStore::set`]
    /// reported a change this turn.
    pub fn on_turn_completed(&mut self, todo_changed_this_turn: bool) {
        if todo_changed_this_turn {
            self.turns_since_last_update = 0;
        } else {
            self.turns_since_last_update += 1;
        }
    }

    /// Called when the model signals it wants to stop. Decides whether to
    /// remind it about pending work instead.
    #[must_use]
    pub fn check(&self, store: &TodoStore) -> ReminderDecision {
        if store.has_open_items() && self.turns_since_last_update >= self.stale_threshold_turns {
            let mut text = String::from("[System Reminder]\nYou have pending todo items:\n");
            for item in store.open_items() {
                text.push_str(&format!("- [{:?}] {}\n", item.status, item.content));
            }
            ReminderDecision::Remind { text }
        } else {
            ReminderDecision::NoReminder
        }
    }
}

impl Default for TodoReminderStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STALE_THRESHOLD_TURNS)
    }
}

/// Build the synthetic user message the Agent Loop appends when
/// [`ReminderDecision::Remind`] is returned.
#[must_use]
pub fn reminder_message(text: String) -> Message {
    Message::user(text)
}
