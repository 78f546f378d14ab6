//! Summarization trigger and history split policy

use super::models::{Message, SummarizationSplit};
use super::token_estimator::{estimate_message_tokens, message_cost};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Most recent messages that are never folded into a summary
pub const MIN_RECENT_MESSAGES: usize = 10;

/// True iff `total_tokens` strictly exceeds `threshold`
pub fn needs_summarization(total_tokens: usize, threshold: usize) -> bool {
    total_tokens > threshold
}

/// Split `messages` into a retained tail and an older head to summarize.
///
/// Scans from the newest message backwards, keeping messages while their
/// accumulated cost stays within half of `target_tokens`. The first message
/// that would overflow stops the scan and is not kept. The retained tail is
/// then raised to at least `min(10, messages.len())`, so histories shorter
/// than ten messages are never summarized.
pub fn calculate_summarization_split(
    messages: &[Message],
    target_tokens: usize,
) -> SummarizationSplit {
    let total = messages.len();
    let mut accumulated = 0usize;
    let mut keep = 0usize;

    for message in messages.iter().rev() {
        let cost = message_cost(message);
        // acc + cost > target / 2, kept in integers
        if (accumulated + cost) * 2 > target_tokens {
            break;
        }
        accumulated += cost;
        keep += 1;
    }

    let keep_messages = keep.max(MIN_RECENT_MESSAGES.min(total));

    SummarizationSplit {
        keep_messages,
        summarize_messages: total - keep_messages,
    }
}

/// Threshold and split target for one deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizationPolicy {
    pub threshold: usize,
    pub target_tokens: usize,
}

impl SummarizationPolicy {
    pub fn new(threshold: usize, target_tokens: usize) -> Self {
        Self {
            threshold,
            target_tokens,
        }
    }

    /// Return a split only when the history is over threshold and the split
    /// actually folds something away
    pub fn evaluate(&self, messages: &[Message]) -> Option<SummarizationSplit> {
        let total_tokens = estimate_message_tokens(messages);
        if !needs_summarization(total_tokens, self.threshold) {
            return None;
        }

        let split = calculate_summarization_split(messages, self.target_tokens);
        debug!(
            total_tokens,
            threshold = self.threshold,
            keep = split.keep_messages,
            summarize = split.summarize_messages,
            "History over summarization threshold"
        );

        if split.is_trivial() {
            None
        } else {
            Some(split)
        }
    }
}
