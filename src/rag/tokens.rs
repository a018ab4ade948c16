//! Approximate token accounting
//!
//! # Algorithm
//!
//! ```text
//! estimate(text) = ⌊chars(text) / 4⌋
//! ```
//!
//! Counting characters rather than bytes keeps accented text from being
//! over-charged and lets truncation always land on a char boundary.

/// Characters per token in the estimate
pub const CHARS_PER_TOKEN: usize = 4;

/// Token counter with heuristic-based estimation
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create new token counter
    pub fn new() -> Self {
        Self
    }

    /// Estimate token count for text
    ///
    /// ```
    /// # use ragserve::rag::tokens::TokenCounter;
    /// let counter = TokenCounter::new();
    /// assert_eq!(counter.estimate(&"a".repeat(100)), 25);
    /// ```
    pub fn estimate(&self, text: &str) -> usize {
        text.chars().count() / CHARS_PER_TOKEN
    }

    /// Longest prefix of `text` whose estimate fits in `tokens`
    pub fn truncate<'a>(&self, text: &'a str, tokens: usize) -> &'a str {
        let max_chars = tokens.saturating_mul(CHARS_PER_TOKEN);
        match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }
}
