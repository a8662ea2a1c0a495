//! Compact: summarize old history into one block when offloading alone
//! doesn't bring the token count under budget.

use std::path::PathBuf;

use synapse_types::{
    CompletionRequest, ContentBlock, ContextError, Message, Provider, Role, SystemPrompt,
};

use crate::offload::referenced_paths;

/// Outcome of a compact pass: the rewritten history and the offload files
/// that are no longer referenced by anything in it.
pub struct CompactOutcome {
    /// History after compaction: preserved system messages, the summary
    /// block, then the preserved trailing messages.
    pub messages: Vec<Message>,
    /// Offload files referenced only by the messages that got folded into
    /// the summary — safe to delete.
    pub unreferenced_files: Vec<PathBuf>,
    /// How many messages were folded into the summary.
    pub compacted_count: usize,
}

const SUMMARIZATION_PROMPT: &str = "Summarize the conversation above concisely. Focus on key \
information, decisions made, and results from tool calls. Write in third person.";

/// Summarize everything but the last `preserve_count` non-system messages
/// via `provider`, replacing them with a single `context_summary` block.
pub async fn run<P: Provider>(
    messages: Vec<Message>,
    provider: &P,
    preserve_count: usize,
) -> Result<CompactOutcome, ContextError> {
    let (system_msgs, non_system): (Vec<Message>, Vec<Message>) =
        messages.into_iter().partition(|m| m.role == Role::System);

    let split_at = non_system.len().saturating_sub(preserve_count);
    let old_messages = non_system[..split_at].to_vec();
    let recent_messages = non_system[split_at..].to_vec();

    if old_messages.is_empty() {
        let mut result = system_msgs;
        result.extend(recent_messages);
        return Ok(CompactOutcome { messages: result, unreferenced_files: vec![], compacted_count: 0 });
    }

    let request = CompletionRequest {
        model: String::new(),
        messages: old_messages.clone(),
        system: Some(SystemPrompt::Text(SUMMARIZATION_PROMPT.to_string())),
        max_tokens: Some(1024),
        temperature: Some(0.0),
        ..CompletionRequest::default()
    };

    let response = provider
        .complete(request)
        .await
        .map_err(|e| ContextError::SummarizationFailed(e.to_string()))?;

    let summary = response.message.text();
    if summary.is_empty() {
        return Err(ContextError::SummarizationFailed(
            "provider returned no text content to use as a summary".to_string(),
        ));
    }

    let compacted_count = old_messages.len();
    let summary_message = Message {
        role: Role::Assistant,
        content: vec![ContentBlock::ContextSummary { summary, compacted_count }],
    };

    let still_referenced = referenced_paths(&system_msgs)
        .into_iter()
        .chain(referenced_paths(&recent_messages))
        .collect::<std::collections::HashSet<_>>();
    let unreferenced_files = referenced_paths(&old_messages)
        .into_iter()
        .filter(|p| !still_referenced.contains(p))
        .collect();

    let mut result = system_msgs;
    result.push(summary_message);
    result.extend(recent_messages);

    Ok(CompactOutcome { messages: result, unreferenced_files, compacted_count })
}
