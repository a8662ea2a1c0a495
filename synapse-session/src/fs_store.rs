//! Filesystem-backed `SessionStore`.
//!
//! Layout:
//! ```text
//! <root>/sessions.json       index, sorted newest-first
//! <root>/<id>.jsonl          one message per line
//! <root>/<id>/offloaded/*    offload artifacts
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use synapse_types::{Message, NullPricing, Pricing, SessionError, TokenUsage};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::store::SessionStore;
use crate::types::{
    derive_title, generate_session_id, CreateSessionOptions, Session, SessionIndex, SessionMeta,
    SessionUsage,
};

/// The lock key every index-touching operation serializes on. `sessions.json`
/// is a single shared file, not one per session, so a per-session lock key
/// would let two different sessions' read-modify-write cycles interleave and
/// drop one side's update; every method that reads then writes the index
/// locks this same key regardless of which session it concerns.
const INDEX_LOCK_KEY: &str = "__index__";

/// Filesystem-backed session store over `tokio::fs`.
///
/// All reads/writes of `sessions.json` are serialized through one shared
/// `Mutex<()>` guard (keyed by [`INDEX_LOCK_KEY`]) so concurrent callers
/// (parallel tool executions appending results, a background compaction
/// rewriting history, two different sessions updating usage at once) cannot
/// interleave index read-modify-write cycles. This trades cross-session
/// parallelism for correctness: every index-touching call blocks behind the
/// same lock, even when the sessions involved are unrelated.
pub struct FsSessionStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    pricing: Arc<dyn Pricing>,
}

impl FsSessionStore {
    /// Open (or lazily create) a session store rooted at `root`, with no
    /// pricing table configured (`update_usage` leaves `cost_usd` absent).
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
            pricing: Arc::new(NullPricing),
        }
    }

    /// Configure the pricing table `update_usage` costs each round against.
    #[must_use]
    pub fn with_pricing(mut self, pricing: Arc<dyn Pricing>) -> Self {
        self.pricing = pricing;
        self
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    fn log_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.jsonl"))
    }

    fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    async fn read_index(&self) -> Result<SessionIndex, SessionError> {
        match tokio::fs::read_to_string(self.index_path()).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| SessionError::Corrupt(format!("sessions.json: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionIndex::default()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// Write the index atomically: write to a sibling temp file, fsync, then
    /// rename over the original. Rename is atomic on the same filesystem, so
    /// a crash mid-write never leaves a half-written `sessions.json`.
    async fn write_index(&self, index: &SessionIndex) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let tmp_path = self.root.join(format!("sessions.json.tmp-{}", uuid::Uuid::new_v4()));
        let contents = serde_json::to_string_pretty(index)?;

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, self.index_path()).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(SessionError::Io(e));
        }
        Ok(())
    }

    async fn upsert_meta(&self, meta: SessionMeta, max_retained: Option<usize>) -> Result<(), SessionError> {
        let mut index = self.read_index().await?;
        index.sessions.retain(|s| s.id != meta.id);
        index.sessions.insert(0, meta);
        if let Some(max) = max_retained
            && index.sessions.len() > max
        {
            index.sessions.truncate(max);
        }
        index.updated_at = chrono::Utc::now();
        self.write_index(&index).await
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn create(&self, opts: CreateSessionOptions) -> Result<SessionMeta, SessionError> {
        let lock = self.lock_for(INDEX_LOCK_KEY).await;
        let _permit = lock.lock().await;

        let now = chrono::Utc::now();
        let id = generate_session_id(now);
        tokio::fs::create_dir_all(&self.root).await?;

        let meta = SessionMeta {
            id: id.clone(),
            created_at: now,
            updated_at: now,
            message_count: 0,
            title: None,
            cwd: opts.cwd,
            usage: None,
        };
        self.upsert_meta(meta.clone(), opts.max_retained).await?;
        Ok(meta)
    }

    async fn find(&self, id: &str) -> Result<Option<SessionMeta>, SessionError> {
        let index = self.read_index().await?;
        Ok(index.sessions.into_iter().find(|s| s.id == id))
    }

    async fn list(&self) -> Result<Vec<SessionMeta>, SessionError> {
        Ok(self.read_index().await?.sessions)
    }

    async fn continue_session(&self, exclude_id: Option<&str>) -> Result<Option<SessionMeta>, SessionError> {
        let index = self.read_index().await?;
        Ok(index
            .sessions
            .into_iter()
            .find(|s| s.message_count > 0 && Some(s.id.as_str()) != exclude_id))
    }

    async fn append_messages(&self, id: &str, messages: &[Message]) -> Result<(), SessionError> {
        if messages.is_empty() {
            return Ok(());
        }
        let lock = self.lock_for(INDEX_LOCK_KEY).await;
        let _permit = lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(id))
            .await?;
        for message in messages {
            let line = serde_json::to_string(message)?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await?;

        let mut index = self.read_index().await?;
        let is_first_user_message = index
            .sessions
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.message_count == 0 && s.title.is_none())
            .unwrap_or(false);

        if let Some(meta) = index.sessions.iter_mut().find(|s| s.id == id) {
            meta.message_count += messages.len();
            meta.updated_at = chrono::Utc::now();
            if is_first_user_message
                && let Some(first_user) = messages.iter().find(|m| m.role == synapse_types::Role::User)
            {
                meta.title = derive_title(first_user);
            }
        }
        index.updated_at = chrono::Utc::now();
        self.write_index(&index).await
    }

    async fn load_history(&self, id: &str) -> Result<Session, SessionError> {
        let meta = self
            .find(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let contents = match tokio::fs::read_to_string(self.log_path(id)).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(SessionError::Io(e)),
        };

        let mut messages = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    tracing::warn!(session_id = %id, line = lineno, error = %e, "skipping corrupted session log line");
                }
            }
        }

        let cwd = meta.cwd.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        Ok(Session {
            id: layer0::SessionId::new(id),
            cwd,
            messages,
        })
    }

    async fn rewrite_history(&self, id: &str, messages: &[Message]) -> Result<(), SessionError> {
        let lock = self.lock_for(INDEX_LOCK_KEY).await;
        let _permit = lock.lock().await;

        let tmp_path = self.root.join(format!("{id}.jsonl.tmp-{}", uuid::Uuid::new_v4()));
        let mut body = String::new();
        for message in messages {
            body.push_str(&serde_json::to_string(message)?);
            body.push('\n');
        }

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(body.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, self.log_path(id)).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(SessionError::Io(e));
        }

        let mut index = self.read_index().await?;
        if let Some(meta) = index.sessions.iter_mut().find(|s| s.id == id) {
            meta.message_count = messages.len();
            meta.updated_at = chrono::Utc::now();
        }
        self.write_index(&index).await
    }

    async fn clear(&self, id: &str, reset_usage: bool) -> Result<(), SessionError> {
        let lock = self.lock_for(INDEX_LOCK_KEY).await;
        let _permit = lock.lock().await;

        let _ = tokio::fs::remove_file(self.log_path(id)).await;
        let offload_dir = self.session_dir(id).join("offloaded");
        let _ = tokio::fs::remove_dir_all(&offload_dir).await;

        let mut index = self.read_index().await?;
        if let Some(meta) = index.sessions.iter_mut().find(|s| s.id == id) {
            meta.message_count = 0;
            meta.updated_at = chrono::Utc::now();
            if reset_usage {
                meta.usage = None;
            }
        }
        self.write_index(&index).await
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let lock = self.lock_for(INDEX_LOCK_KEY).await;
        let _permit = lock.lock().await;

        let _ = tokio::fs::remove_file(self.log_path(id)).await;
        let _ = tokio::fs::remove_dir_all(self.session_dir(id)).await;

        let mut index = self.read_index().await?;
        index.sessions.retain(|s| s.id != id);
        self.write_index(&index).await
    }

    async fn update_usage(&self, id: &str, usage: &TokenUsage, model: &str) -> Result<(), SessionError> {
        let lock = self.lock_for(INDEX_LOCK_KEY).await;
        let _permit = lock.lock().await;

        let mut index = self.read_index().await?;
        if let Some(meta) = index.sessions.iter_mut().find(|s| s.id == id) {
            let mut session_usage = meta.usage.clone().unwrap_or_default();
            session_usage.tokens.accumulate(usage);
            let cost_usd = self.pricing.calculate_cost(&session_usage.tokens, model).or(session_usage.cost_usd);
            meta.usage = Some(SessionUsage { tokens: session_usage.tokens, cost_usd });
            meta.updated_at = chrono::Utc::now();
        }
        self.write_index(&index).await
    }

    async fn offload_dir(&self, id: &str) -> Result<PathBuf, SessionError> {
        let dir = self.session_dir(id).join("offloaded");
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

fn _assert_session_store_object_safe(_: &dyn SessionStore) {}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_types::Message;

    async fn store() -> (tempfile::TempDir, FsSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let (_dir, store) = store().await;
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();
        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert_eq!(found.id, meta.id);
        assert_eq!(found.message_count, 0);
    }

    #[tokio::test]
    async fn append_messages_bumps_count_and_sets_title() {
        let (_dir, store) = store().await;
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();
        store
            .append_messages(&meta.id, &[Message::user("hello there"), Message::assistant("hi")])
            .await
            .unwrap();

        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert_eq!(found.message_count, 2);
        assert_eq!(found.title.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn load_history_skips_corrupted_lines() {
        let (dir, store) = store().await;
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();
        store.append_messages(&meta.id, &[Message::user("ok")]).await.unwrap();

        let log_path = dir.path().join(format!("{}.jsonl", meta.id));
        let mut contents = tokio::fs::read_to_string(&log_path).await.unwrap();
        contents.push_str("{not valid json\n");
        tokio::fs::write(&log_path, contents).await.unwrap();

        let session = store.load_history(&meta.id).await.unwrap();
        assert_eq!(session.messages.len(), 1);
    }

    #[tokio::test]
    async fn rewrite_history_replaces_log_atomically() {
        let (_dir, store) = store().await;
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();
        store
            .append_messages(&meta.id, &[Message::user("a"), Message::user("b"), Message::user("c")])
            .await
            .unwrap();

        store
            .rewrite_history(&meta.id, &[Message::assistant("summary")])
            .await
            .unwrap();

        let session = store.load_history(&meta.id).await.unwrap();
        assert_eq!(session.messages.len(), 1);
        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert_eq!(found.message_count, 1);
    }

    #[tokio::test]
    async fn clear_resets_count_and_optionally_usage() {
        let (_dir, store) = store().await;
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();
        store.append_messages(&meta.id, &[Message::user("a")]).await.unwrap();
        store
            .update_usage(&meta.id, &TokenUsage { input_tokens: 10, ..Default::default() }, "claude-haiku-4-5-20251001")
            .await
            .unwrap();

        store.clear(&meta.id, false).await.unwrap();
        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert_eq!(found.message_count, 0);
        assert!(found.usage.is_some());

        store.clear(&meta.id, true).await.unwrap();
        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert!(found.usage.is_none());
    }

    #[tokio::test]
    async fn update_usage_computes_cost_from_configured_pricing() {
        struct FlatRate;
        impl synapse_types::Pricing for FlatRate {
            fn calculate_cost(&self, usage: &TokenUsage, _model: &str) -> Option<rust_decimal::Decimal> {
                Some(rust_decimal::Decimal::from(usage.input_tokens + usage.output_tokens))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path().to_path_buf()).with_pricing(Arc::new(FlatRate));
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();

        store
            .update_usage(&meta.id, &TokenUsage { input_tokens: 3, output_tokens: 2, ..Default::default() }, "m")
            .await
            .unwrap();
        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert_eq!(found.usage.unwrap().cost_usd, Some(rust_decimal::Decimal::from(5)));
    }

    #[tokio::test]
    async fn update_usage_without_pricing_leaves_cost_absent() {
        let (_dir, store) = store().await;
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();

        store.update_usage(&meta.id, &TokenUsage { input_tokens: 3, ..Default::default() }, "m").await.unwrap();
        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert_eq!(found.usage.unwrap().cost_usd, None);
    }

    #[tokio::test]
    async fn delete_removes_index_entry_and_log() {
        let (dir, store) = store().await;
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();
        store.append_messages(&meta.id, &[Message::user("a")]).await.unwrap();
        store.delete(&meta.id).await.unwrap();

        assert!(store.find(&meta.id).await.unwrap().is_none());
        assert!(!dir.path().join(format!("{}.jsonl", meta.id)).exists());
    }

    #[tokio::test]
    async fn concurrent_appends_to_same_session_do_not_lose_messages() {
        let (_dir, store) = store().await;
        let store = Arc::new(store);
        let meta = store.create(CreateSessionOptions::default()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            let id = meta.id.clone();
            handles.push(tokio::spawn(async move {
                store.append_messages(&id, &[Message::user(format!("msg {i}"))]).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let found = store.find(&meta.id).await.unwrap().unwrap();
        assert_eq!(found.message_count, 10);
    }

    proptest::proptest! {
        /// P10: interleaved `update_usage` calls across several different
        /// sessions never lose an update. Each session's final token total
        /// must equal the sum of every update assigned to it, regardless of
        /// the order tasks actually interleave in.
        #[test]
        fn concurrent_update_usage_across_sessions_is_linearizable(
            ops in proptest::collection::vec((0usize..4, 1usize..50), 1..40)
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let dir = tempfile::tempdir().unwrap();
                let store = Arc::new(FsSessionStore::new(dir.path().to_path_buf()));

                let mut session_ids = Vec::new();
                for _ in 0..4 {
                    session_ids.push(store.create(CreateSessionOptions::default()).await.unwrap().id);
                }

                let mut expected = [0usize; 4];
                let mut handles = Vec::new();
                for (session_idx, input_tokens) in ops {
                    expected[session_idx] += input_tokens;
                    let store = store.clone();
                    let id = session_ids[session_idx].clone();
                    handles.push(tokio::spawn(async move {
                        let usage = TokenUsage { input_tokens, ..Default::default() };
                        store.update_usage(&id, &usage, "m").await.unwrap();
                    }));
                }
                for h in handles {
                    h.await.unwrap();
                }

                for (idx, id) in session_ids.iter().enumerate() {
                    let found = store.find(id).await.unwrap().unwrap();
                    let actual = found.usage.map(|u| u.tokens.input_tokens).unwrap_or(0);
                    proptest::prop_assert_eq!(actual, expected[idx]);
                }
                Ok(())
            })?;
        }
    }
}
