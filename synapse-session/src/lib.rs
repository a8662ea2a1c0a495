#![deny(missing_docs)]
//! Session persistence: an append-only JSONL log per session plus a
//! newest-first index, atomically rewritable for compaction and
//! sanitization.

mod fs_store;
mod store;
mod types;

pub use fs_store::FsSessionStore;
pub use store::SessionStore;
pub use types::{
    derive_title, generate_session_id, CreateSessionOptions, Session, SessionIndex, SessionMeta,
    SessionUsage,
};
