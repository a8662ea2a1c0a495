//! Session and session-index data types.

use std::path::PathBuf;

use layer0::SessionId;
use serde::{Deserialize, Serialize};
use synapse_types::{Message, TokenUsage};

/// A conversation session: its identity, working directory, and the
/// in-memory view of its message history.
#[derive(Debug, Clone)]
pub struct Session {
    /// The session's unique identifier.
    pub id: SessionId,
    /// Working directory the session was started in.
    pub cwd: PathBuf,
    /// The conversation so far.
    pub messages: Vec<Message>,
}

impl Session {
    /// Create a new, empty session.
    #[must_use]
    pub fn new(id: impl Into<String>, cwd: PathBuf) -> Self {
        Self {
            id: SessionId::new(id.into()),
            cwd,
            messages: Vec::new(),
        }
    }
}

/// Per-session metadata kept in the index for fast listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// The session id.
    pub id: String,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last-modified timestamp.
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Number of messages currently in the JSONL log.
    pub message_count: usize,
    /// Derived title (first user message, truncated to 50 chars + `…`).
    pub title: Option<String>,
    /// Working directory the session was started in.
    pub cwd: Option<String>,
    /// Cumulative token usage and cost, if tracked.
    pub usage: Option<SessionUsage>,
}

/// Token usage and derived cost for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUsage {
    /// Cumulative token usage.
    pub tokens: TokenUsage,
    /// Cumulative cost in USD, if a pricing function was supplied. Absent
    /// rather than zero when no pricing function is configured — see
    /// `synapse_types::NullPricing`, the default `FsSessionStore` uses.
    pub cost_usd: Option<rust_decimal::Decimal>,
}

/// The on-disk session index: `sessions.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIndex {
    /// Schema version, for forward migrations.
    pub version: u32,
    /// When this index was last written.
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Sessions, sorted newest-first.
    pub sessions: Vec<SessionMeta>,
}

impl Default for SessionIndex {
    fn default() -> Self {
        Self {
            version: 1,
            updated_at: chrono::Utc::now(),
            sessions: Vec::new(),
        }
    }
}

/// Options for creating a new session.
#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
    /// Working directory to record on the session.
    pub cwd: Option<String>,
    /// Maximum number of sessions to retain in the index; oldest entries
    /// beyond this are evicted (but not deleted from disk).
    pub max_retained: Option<usize>,
}

/// Derive a session id of the form `session-<base36-time>-<6-random-hex>`.
#[must_use]
pub fn generate_session_id(now: chrono::DateTime<chrono::Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let time_b36 = to_base36(millis);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("session-{time_b36}-{}", &suffix[..6])
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 digits are ASCII")
}

/// Derive a session title from the first user message: plain text,
/// truncated to 50 chars with a `…` suffix if longer.
#[must_use]
pub fn derive_title(first_user_message: &Message) -> Option<String> {
    let text = first_user_message.text();
    if text.is_empty() {
        return None;
    }
    let truncated: String = text.chars().take(50).collect();
    if text.chars().count() > 50 {
        Some(format!("{truncated}…"))
    } else {
        Some(truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_roundtrip_is_monotonic_for_increasing_millis() {
        let a = to_base36(1_700_000_000_000);
        let b = to_base36(1_700_000_000_001);
        assert_ne!(a, b);
    }

    #[test]
    fn title_truncates_long_text_with_ellipsis() {
        let msg = Message::user("x".repeat(80));
        let title = derive_title(&msg).unwrap();
        assert_eq!(title.chars().count(), 51);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn title_is_none_for_empty_text() {
        let msg = Message {
            role: synapse_types::Role::User,
            content: vec![],
        };
        assert!(derive_title(&msg).is_none());
    }
}
