#![deny(missing_docs)]
//! Repairs `tool_use`/`tool_result` invariant violations (I1-I4) in a
//! message history in a single forward pass, without user involvement.

use std::collections::HashSet;

use synapse_types::{ContentBlock, Message, Role};

/// Sanitize `messages` in place, returning whether anything changed.
///
/// Single pass: walk messages in order, tracking the set of `tool_use` ids
/// emitted by the most recent assistant message that have not yet been
/// matched by a `tool_result`. A `tool_result` whose id isn't pending is
/// dropped (I2). Any `tool_use` ids still pending once the next assistant
/// message starts (or the scan ends) are dropped from the message that
/// emitted them (I1). `tool_use` ids already seen anywhere earlier in the
/// session are treated as duplicates and dropped (I3) — the remainder of
/// the scan continues to use only the first occurrence.
pub fn sanitize(messages: &mut [Message]) -> bool {
    let mut changed = false;
    let mut seen_tool_use_ids: HashSet<String> = HashSet::new();
    let mut pending: HashSet<String> = HashSet::new();
    let mut pending_owner: Option<usize> = None;

    for idx in 0..messages.len() {
        let role = messages[idx].role;

        if role == Role::Assistant {
            // Any tool_use ids still pending from an earlier assistant
            // message never got a result before this new turn started.
            if let Some(owner) = pending_owner.take()
                && !pending.is_empty()
            {
                changed |= drop_unmatched_tool_uses(&mut messages[owner], &pending);
                pending.clear();
            }

            let mut dropped_duplicate = false;
            let mut new_pending = HashSet::new();
            for block in &messages[idx].content {
                if let ContentBlock::ToolUse { id, .. } = block {
                    if seen_tool_use_ids.contains(id) {
                        dropped_duplicate = true;
                    } else {
                        seen_tool_use_ids.insert(id.clone());
                        new_pending.insert(id.clone());
                    }
                }
            }
            if dropped_duplicate {
                changed |= drop_duplicate_tool_uses(&mut messages[idx], &seen_tool_use_ids, &new_pending);
            }
            if !new_pending.is_empty() {
                pending = new_pending;
                pending_owner = Some(idx);
            }
            continue;
        }

        // Non-assistant message: drop any tool_result whose id isn't pending (I2),
        // and mark matched ids as resolved.
        let before = messages[idx].content.len();
        messages[idx].content.retain(|block| match block {
            ContentBlock::ToolResult { tool_use_id, .. } => pending.remove(tool_use_id),
            _ => true,
        });
        if messages[idx].content.len() != before {
            changed = true;
        }
        if pending.is_empty() {
            pending_owner = None;
        }
    }

    // End of scan: anything still pending never got a result.
    if let Some(owner) = pending_owner
        && !pending.is_empty()
    {
        changed |= drop_unmatched_tool_uses(&mut messages[owner], &pending);
    }

    if changed {
        tracing::warn!("history sanitizer repaired invariant violations");
    }
    changed
}

fn drop_unmatched_tool_uses(message: &mut Message, ids: &HashSet<String>) -> bool {
    let before = message.content.len();
    message.content.retain(|block| match block {
        ContentBlock::ToolUse { id, .. } => !ids.contains(id),
        _ => true,
    });
    message.content.len() != before
}

/// Keep only the first occurrence of each `tool_use` id (I3); any block
/// whose id is not in `keep` was a duplicate seen before this message and
/// is dropped.
fn drop_duplicate_tool_uses(
    message: &mut Message,
    _seen: &HashSet<String>,
    keep: &HashSet<String>,
) -> bool {
    let before = message.content.len();
    message.content.retain(|block| match block {
        ContentBlock::ToolUse { id, .. } => keep.contains(id),
        _ => true,
    });
    message.content.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_types::ContentBlock;

    fn assistant_with_tool_use(id: &str) -> Message {
        Message {
            role: Role::Assistant,
            content: vec![ContentBlock::tool_use(id, "read_file", serde_json::json!({}))],
        }
    }

    fn user_with_tool_result(id: &str) -> Message {
        Message::tool_results(vec![ContentBlock::tool_result(id, "ok")])
    }

    #[test]
    fn well_formed_history_is_unchanged() {
        let mut messages = vec![
            Message::user("hi"),
            assistant_with_tool_use("call_1"),
            user_with_tool_result("call_1"),
            Message::assistant("done"),
        ];
        let changed = sanitize(&mut messages);
        assert!(!changed);
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn dangling_tool_use_without_result_is_dropped() {
        let mut messages = vec![assistant_with_tool_use("call_1"), Message::assistant("done")];
        let changed = sanitize(&mut messages);
        assert!(changed);
        assert!(messages[0].content.is_empty());
    }

    #[test]
    fn orphaned_tool_result_without_tool_use_is_dropped() {
        let mut messages = vec![Message::user("hi"), user_with_tool_result("call_1")];
        let changed = sanitize(&mut messages);
        assert!(changed);
        assert!(messages[1].content.is_empty());
    }

    #[test]
    fn duplicate_tool_use_id_keeps_only_first() {
        let mut messages = vec![
            assistant_with_tool_use("call_1"),
            user_with_tool_result("call_1"),
            assistant_with_tool_use("call_1"),
        ];
        let changed = sanitize(&mut messages);
        assert!(changed);
        assert!(messages[2].content.is_empty());
    }

    #[test]
    fn multiple_tool_uses_matched_out_of_order_all_resolve() {
        let mut messages = vec![
            Message {
                role: Role::Assistant,
                content: vec![
                    ContentBlock::tool_use("call_1", "a", serde_json::json!({})),
                    ContentBlock::tool_use("call_2", "b", serde_json::json!({})),
                ],
            },
            Message::tool_results(vec![
                ContentBlock::tool_result("call_2", "second done"),
                ContentBlock::tool_result("call_1", "first done"),
            ]),
        ];
        let changed = sanitize(&mut messages);
        assert!(!changed);
        assert_eq!(messages[1].content.len(), 2);
    }
}
