//! The object-safe `SessionStore` trait.

use async_trait::async_trait;
use synapse_types::{Message, SessionError};

use crate::types::{CreateSessionOptions, Session, SessionMeta};

/// Persists conversation history and metadata.
///
/// Object safe and `#[async_trait]`, mirroring `layer0::state::StateStore`'s
/// shape: a small set of CRUD-ish operations behind a trait object, so
/// callers can swap storage backends without the rest of the loop caring.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session, returning its metadata.
    async fn create(&self, opts: CreateSessionOptions) -> Result<SessionMeta, SessionError>;

    /// Look up a session's metadata without loading its history.
    async fn find(&self, id: &str) -> Result<Option<SessionMeta>, SessionError>;

    /// List all sessions, newest first.
    async fn list(&self) -> Result<Vec<SessionMeta>, SessionError>;

    /// The most recent non-empty session other than `exclude_id`, if any.
    async fn continue_session(&self, exclude_id: Option<&str>) -> Result<Option<SessionMeta>, SessionError>;

    /// Append messages to a session's log, bumping its message count and
    /// index entry. The first call derives the session's title.
    async fn append_messages(&self, id: &str, messages: &[Message]) -> Result<(), SessionError>;

    /// Load the full message history for a session. Corrupted lines are
    /// skipped with a warning rather than aborting the load.
    async fn load_history(&self, id: &str) -> Result<Session, SessionError>;

    /// Atomically replace a session's entire history (used by the History
    /// Sanitizer and Context Orchestrator after a rewrite).
    async fn rewrite_history(&self, id: &str, messages: &[Message]) -> Result<(), SessionError>;

    /// Truncate a session's history and offload directory. Usage counters
    /// reset unless `reset_usage` is `false`.
    async fn clear(&self, id: &str, reset_usage: bool) -> Result<(), SessionError>;

    /// Remove a session's log, offload directory, and index entry entirely.
    async fn delete(&self, id: &str) -> Result<(), SessionError>;

    /// Accumulate token usage for a completed round and recompute cost via
    /// the store's configured pricing function against `model`.
    async fn update_usage(&self, id: &str, usage: &synapse_types::TokenUsage, model: &str) -> Result<(), SessionError>;

    /// The session's offload directory, creating it if necessary. Exposed
    /// so the Context Orchestrator can write offload artifacts directly.
    async fn offload_dir(&self, id: &str) -> Result<std::path::PathBuf, SessionError>;
}
