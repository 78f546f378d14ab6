//! Token estimation
//!
//! Budget decisions use a fixed 4-characters-per-token heuristic. Downstream
//! prompt budgets are tuned against it, so it must not be swapped for a real
//! tokenizer. The tiktoken estimator exists for calibration only.

use super::models::Message;
use crate::error::{ContextError, Result};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Characters per token assumed by the heuristic
pub const CHARS_PER_TOKEN: usize = 4;

/// Structural framing cost (role tags, delimiters) charged per message
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Estimate the tokens in `text` as `ceil(len / 4)`.
///
/// Length is counted in UTF-16 code units, matching the browser client the
/// budgets were tuned on. Empty text costs nothing.
pub fn estimate_tokens(text: &str) -> usize {
    let len = text.encode_utf16().count();
    len.div_ceil(CHARS_PER_TOKEN)
}

/// Estimate a message sequence: content estimate plus framing overhead for
/// every message.
pub fn estimate_message_tokens(messages: &[Message]) -> usize {
    messages.iter().map(message_cost).sum()
}

/// Cost of a single message including overhead
pub fn message_cost(message: &Message) -> usize {
    estimate_tokens(message.content()) + MESSAGE_OVERHEAD_TOKENS
}

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }

    /// Estimate a message sequence including per-message overhead
    fn estimate_messages(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| self.estimate(m.content()) + MESSAGE_OVERHEAD_TOKENS)
            .sum()
    }
}

/// The character heuristic used for all budget decisions
#[derive(Debug, Clone, Copy, Default)]
pub struct CharHeuristicEstimator;

impl TokenEstimator for CharHeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Tiktoken-based estimator using cl100k_base, kept for calibrating the
/// heuristic against real BPE counts
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TiktokenEstimator {
    /// Create a new tiktoken estimator with cl100k_base encoding
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| {
            ContextError::Configuration(format!("Failed to load cl100k_base: {}", e))
        })?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Observed characters per BPE token for `text`, or `None` when the text
    /// encodes to no tokens
    pub fn chars_per_token(&self, text: &str) -> Option<f64> {
        let tokens = self.estimate(text);
        if tokens == 0 {
            return None;
        }
        Some(text.encode_utf16().count() as f64 / tokens as f64)
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_division() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("aaaa"), 1);
        assert_eq!(estimate_tokens("aaaaa"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn test_counts_utf16_units() {
        // Four BMP characters, one astral character (two UTF-16 units)
        assert_eq!(estimate_tokens("äöüß"), 1);
        assert_eq!(estimate_tokens("🐠🐟🐡"), 2);
    }

    #[test]
    fn test_concatenation_never_decreases() {
        let samples = ["", "a", "tank", "nitrate is 40ppm", "🐠", "ammonia spike after feeding"];
        for a in samples {
            for b in samples {
                let joined = format!("{}{}", a, b);
                let combined = estimate_tokens(&joined);
                assert!(combined >= estimate_tokens(a));
                assert!(combined >= estimate_tokens(b));
            }
        }
    }

    #[test]
    fn test_message_tokens() {
        assert_eq!(estimate_message_tokens(&[]), 0);
        assert_eq!(estimate_message_tokens(&[Message::user("hi")]), 5);

        let messages = vec![
            Message::system("aaaa"),
            Message::user("aaaaa"),
            Message::assistant(""),
        ];
        assert_eq!(estimate_message_tokens(&messages), (1 + 4) + (2 + 4) + 4);
    }

    #[test]
    fn test_heuristic_trait_matches_free_functions() {
        let estimator = CharHeuristicEstimator;
        let messages = vec![Message::user("What temperature for neon tetras?")];
        assert_eq!(estimator.estimate("aaaaa"), estimate_tokens("aaaaa"));
        assert_eq!(
            estimator.estimate_messages(&messages),
            estimate_message_tokens(&messages)
        );
        assert_eq!(estimator.estimate_batch(&["a", "aaaaa"]), vec![1, 2]);
    }

    #[test]
    fn test_tiktoken_estimator() {
        let estimator = TiktokenEstimator::new().unwrap();
        let tokens = estimator.estimate("Hello, world! This is a test.");
        assert!(tokens > 0);
        assert!(tokens < 20);
    }

    #[test]
    fn test_tiktoken_calibration() {
        let estimator = TiktokenEstimator::new().unwrap();
        assert!(estimator.chars_per_token("").is_none());

        let ratio = estimator
            .chars_per_token("My nitrate readings keep climbing after every water change.")
            .unwrap();
        assert!(ratio > 2.0 && ratio < 8.0);
    }
}
