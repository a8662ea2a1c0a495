//! Token counting. An approximation, not a tokenizer.

use synapse_types::{ContentBlock, ContentItem, Message};

/// A fixed per-message overhead (role, formatting) and a fixed cost for the
/// content kinds that don't have a meaningful character count.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;
const IMAGE_TOKENS: usize = 300;

/// Estimates token counts for messages using a chars-per-token ratio.
///
/// A chars-per-token ratio, like `SlidingWindow::chars_per_token`
/// elsewhere in this codebase: a rough approximation good enough to decide
/// *when* to offload or compact, not a substitute for the provider's own
/// tokenizer.
#[derive(Debug, Clone)]
pub struct TokenCounter {
    chars_per_token: f64,
}

impl TokenCounter {
    /// The default ratio: 4 characters per token.
    pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

    /// A counter using the default ratio.
    #[must_use]
    pub fn new() -> Self {
        Self { chars_per_token: Self::DEFAULT_CHARS_PER_TOKEN }
    }

    /// A counter using a custom chars-per-token ratio.
    #[must_use]
    pub fn with_ratio(chars_per_token: f64) -> Self {
        Self { chars_per_token: chars_per_token.max(f64::MIN_POSITIVE) }
    }

    /// Estimate the token count of a single string, rounding up.
    #[must_use]
    pub fn estimate_text(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }

    fn estimate_content_item(&self, item: &ContentItem) -> usize {
        match item {
            ContentItem::Text(text) => self.estimate_text(text),
            ContentItem::Image { .. } => IMAGE_TOKENS,
        }
    }

    fn estimate_block(&self, block: &ContentBlock) -> usize {
        match block {
            ContentBlock::Text { text } => self.estimate_text(text),
            ContentBlock::Thinking { content, .. } => self.estimate_text(content),
            ContentBlock::ToolUse { name, input, .. } => {
                self.estimate_text(name) + self.estimate_text(&input.to_string())
            }
            ContentBlock::ToolResult { content, .. } => {
                content.iter().map(|item| self.estimate_content_item(item)).sum()
            }
            ContentBlock::SkillSearch { query, results } => {
                self.estimate_text(query) + results.iter().map(|r| self.estimate_text(r)).sum::<usize>()
            }
            ContentBlock::ContextSummary { summary, .. } => self.estimate_text(summary),
            ContentBlock::Other => 0,
        }
    }

    /// Estimate the total token count of a message list, including a fixed
    /// per-message overhead for role and formatting.
    #[must_use]
    pub fn estimate_messages(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| {
                MESSAGE_OVERHEAD_TOKENS
                    + m.content.iter().map(|b| self.estimate_block(b)).sum::<usize>()
            })
            .sum()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}
