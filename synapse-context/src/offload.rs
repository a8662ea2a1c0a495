//! Offload: replace large tool-result bodies with a file reference.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use synapse_types::{ContentBlock, ContentItem, ContextError, Message};
use uuid::Uuid;

/// Prefix written in place of an offloaded tool result's content. Doubles as
/// the sentinel that marks a result as already offloaded, so a second pass
/// over the same history is a no-op (P4: offload is idempotent).
pub const SENTINEL_PREFIX: &str = "Tool result is at: ";

/// Outcome of one offload pass.
#[derive(Debug, Clone, Default)]
pub struct OffloadStats {
    /// Number of tool results moved to disk this pass.
    pub offloaded_count: usize,
    /// Bytes removed from in-memory history (original body minus the
    /// reference string that replaced it).
    pub freed_bytes: usize,
}

fn joined_text(content: &[ContentItem]) -> Option<String> {
    let mut parts = Vec::new();
    for item in content {
        match item {
            ContentItem::Text(t) => parts.push(t.as_str()),
            ContentItem::Image { .. } => return None,
        }
    }
    Some(parts.join("\n"))
}

fn is_already_offloaded(content: &[ContentItem]) -> bool {
    match content {
        [ContentItem::Text(t)] => t.starts_with(SENTINEL_PREFIX),
        _ => false,
    }
}

/// Scan the oldest `ratio` prefix of `messages` and move any `tool_result`
/// text body over `min_chars` to a new file under `offload_dir`, replacing
/// its content with a `"Tool result is at: <path>"` reference.
pub async fn run(
    messages: &mut [Message],
    offload_dir: &Path,
    ratio: f64,
    min_chars: usize,
) -> Result<OffloadStats, ContextError> {
    let scan_end = ((messages.len() as f64) * ratio.clamp(0.0, 1.0)).ceil() as usize;
    let mut stats = OffloadStats::default();

    for message in messages.iter_mut().take(scan_end) {
        for block in &mut message.content {
            let ContentBlock::ToolResult { content, .. } = block else {
                continue;
            };
            if is_already_offloaded(content) {
                continue;
            }
            let Some(text) = joined_text(content) else {
                continue;
            };
            if text.len() <= min_chars {
                continue;
            }

            let filename = format!("{}.txt", Uuid::new_v4());
            let path = offload_dir.join(&filename);
            tokio::fs::create_dir_all(offload_dir)
                .await
                .map_err(|e| ContextError::OffloadUnavailable(e.to_string()))?;
            tokio::fs::write(&path, &text)
                .await
                .map_err(|e| ContextError::OffloadUnavailable(e.to_string()))?;

            let reference = format!("{SENTINEL_PREFIX}{}", path.display());
            stats.freed_bytes += text.len().saturating_sub(reference.len());
            stats.offloaded_count += 1;
            *content = vec![ContentItem::Text(reference)];
        }
    }

    Ok(stats)
}

/// Extract every offload file path referenced by `tool_result` blocks in
/// `messages`, for the compaction step's "don't delete what's still
/// referenced" bookkeeping.
pub fn referenced_paths(messages: &[Message]) -> HashSet<PathBuf> {
    let mut paths = HashSet::new();
    for message in messages {
        for block in &message.content {
            let ContentBlock::ToolResult { content, .. } = block else {
                continue;
            };
            if let [ContentItem::Text(t)] = content.as_slice() {
                if let Some(rest) = t.strip_prefix(SENTINEL_PREFIX) {
                    paths.insert(PathBuf::from(rest));
                }
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_types::Role;

    fn tool_result_message(tool_use_id: &str, text: &str) -> Message {
        Message {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.to_string(),
                content: vec![ContentItem::Text(text.to_string())],
                is_error: false,
            }],
        }
    }

    #[tokio::test]
    async fn offloads_text_over_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut messages = vec![tool_result_message("id1", &"x".repeat(1000))];
        let stats = run(&mut messages, dir.path(), 1.0, 100).await.unwrap();
        assert_eq!(stats.offloaded_count, 1);
        assert!(stats.freed_bytes > 0);

        let ContentBlock::ToolResult { content, .. } = &messages[0].content[0] else {
            panic!("expected tool result");
        };
        let ContentItem::Text(t) = &content[0] else { panic!("expected text") };
        assert!(t.starts_with(SENTINEL_PREFIX));
    }

    #[tokio::test]
    async fn leaves_short_results_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut messages = vec![tool_result_message("id1", "short")];
        let stats = run(&mut messages, dir.path(), 1.0, 100).await.unwrap();
        assert_eq!(stats.offloaded_count, 0);
    }

    #[tokio::test]
    async fn second_pass_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut messages = vec![tool_result_message("id1", &"x".repeat(1000))];
        run(&mut messages, dir.path(), 1.0, 100).await.unwrap();
        let second = run(&mut messages, dir.path(), 1.0, 100).await.unwrap();
        assert_eq!(second.offloaded_count, 0);
    }

    #[tokio::test]
    async fn ratio_limits_scan_to_oldest_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut messages = vec![
            tool_result_message("id1", &"x".repeat(1000)),
            tool_result_message("id2", &"y".repeat(1000)),
        ];
        // ratio 0.5 of 2 messages -> scan_end = ceil(1.0) = 1
        run(&mut messages, dir.path(), 0.5, 100).await.unwrap();

        let ContentBlock::ToolResult { content, .. } = &messages[0].content[0] else {
            panic!()
        };
        assert!(matches!(&content[0], ContentItem::Text(t) if t.starts_with(SENTINEL_PREFIX)));

        let ContentBlock::ToolResult { content, .. } = &messages[1].content[0] else {
            panic!()
        };
        assert!(matches!(&content[0], ContentItem::Text(t) if !t.starts_with(SENTINEL_PREFIX)));
    }

    #[test]
    fn referenced_paths_extracts_offload_references() {
        let messages = vec![tool_result_message(
            "id1",
            &format!("{SENTINEL_PREFIX}/tmp/sessions/s1/offloaded/abc.txt"),
        )];
        let paths = referenced_paths(&messages);
        assert_eq!(paths.len(), 1);
        assert!(paths.contains(&PathBuf::from("/tmp/sessions/s1/offloaded/abc.txt")));
    }

    proptest::proptest! {
        /// P4: offloading an already-offloaded history is a no-op, for any
        /// mix of tool-result lengths around the threshold.
        #[test]
        fn offload_is_idempotent_for_arbitrary_text_lengths(lens in proptest::collection::vec(0usize..3000, 1..8)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let dir = tempfile::tempdir().unwrap();
                let mut messages: Vec<Message> = lens
                    .iter()
                    .enumerate()
                    .map(|(i, len)| tool_result_message(&format!("id{i}"), &"x".repeat(*len)))
                    .collect();

                run(&mut messages, dir.path(), 1.0, 100).await.unwrap();
                let after_first_pass: Vec<String> =
                    messages.iter().map(|m| serde_json::to_string(m).unwrap()).collect();

                let second = run(&mut messages, dir.path(), 1.0, 100).await.unwrap();
                let after_second_pass: Vec<String> =
                    messages.iter().map(|m| serde_json::to_string(m).unwrap()).collect();

                proptest::prop_assert_eq!(second.offloaded_count, 0);
                proptest::prop_assert_eq!(after_first_pass, after_second_pass);
                Ok(())
            })?;
        }
    }
}
