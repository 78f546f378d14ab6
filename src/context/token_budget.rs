//! Token budget management for chat context assembly
//!
//! Fixed budget knobs:
//! - Context window: 100,000 tokens
//! - Summarization threshold (history): 8,000 tokens
//! - System prompt: 4,000 tokens
//! - User message: 2,000 tokens
//! - Response reserve: 2,000 tokens
//! - Generated summary: 300 tokens

use super::token_estimator::{estimate_tokens, CHARS_PER_TOKEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_CONTEXT: usize = 100_000;
pub const SUMMARIZATION_THRESHOLD: usize = 8_000;
pub const MAX_SYSTEM_PROMPT: usize = 4_000;
pub const MAX_USER_MESSAGE: usize = 2_000;
pub const MAX_RESPONSE: usize = 2_000;
pub const MAX_SUMMARY: usize = 300;

/// Token budget configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudgetConfig {
    #[serde(default = "default_max_context")]
    pub max_context: usize,
    #[serde(default = "default_summarization_threshold")]
    pub summarization_threshold: usize,
    #[serde(default = "default_max_system_prompt")]
    pub max_system_prompt: usize,
    #[serde(default = "default_max_user_message")]
    pub max_user_message: usize,
    #[serde(default = "default_max_response")]
    pub max_response: usize,
    #[serde(default = "default_max_summary")]
    pub max_summary: usize,
}

fn default_max_context() -> usize {
    MAX_CONTEXT
}

fn default_summarization_threshold() -> usize {
    SUMMARIZATION_THRESHOLD
}

fn default_max_system_prompt() -> usize {
    MAX_SYSTEM_PROMPT
}

fn default_max_user_message() -> usize {
    MAX_USER_MESSAGE
}

fn default_max_response() -> usize {
    MAX_RESPONSE
}

fn default_max_summary() -> usize {
    MAX_SUMMARY
}

impl Default for ContextBudgetConfig {
    fn default() -> Self {
        Self {
            max_context: default_max_context(),
            summarization_threshold: default_summarization_threshold(),
            max_system_prompt: default_max_system_prompt(),
            max_user_message: default_max_user_message(),
            max_response: default_max_response(),
            max_summary: default_max_summary(),
        }
    }
}

impl ContextBudgetConfig {
    /// Validate that the budget configuration is consistent
    pub fn validate(&self) -> Result<(), BudgetError> {
        let reserved = self.max_system_prompt
            + self.max_user_message
            + self.max_response
            + self.max_summary;

        if reserved > self.max_context {
            return Err(BudgetError::ConfigurationInvalid {
                allocated: reserved,
                max: self.max_context,
            });
        }

        if self.summarization_threshold >= self.max_context {
            return Err(BudgetError::ConfigurationInvalid {
                allocated: self.summarization_threshold,
                max: self.max_context,
            });
        }

        Ok(())
    }
}

/// Budget allocation for one assembled context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub system_tokens: usize,
    pub summary_tokens: usize,
    pub history_tokens: usize,
    pub user_message_tokens: usize,
    pub response_reserve: usize,
    pub total_allocated: usize,
    pub remaining: usize,
}

impl BudgetAllocation {
    /// Check if this allocation fits within the budget
    pub fn is_within_budget(&self, max_total: usize) -> bool {
        self.total_allocated <= max_total
    }

    /// Tokens of the emitted prompt, excluding the response reserve
    pub fn prompt_tokens(&self) -> usize {
        self.total_allocated - self.response_reserve
    }
}

/// Token budget errors
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Budget exceeded: {used} tokens used, {max} tokens allowed")]
    BudgetExceeded { used: usize, max: usize },

    #[error("Configuration invalid: {allocated} tokens allocated, {max} tokens max")]
    ConfigurationInvalid { allocated: usize, max: usize },
}

/// Token budget manager
#[derive(Debug, Clone)]
pub struct TokenBudgetManager {
    config: ContextBudgetConfig,
}

impl TokenBudgetManager {
    /// Create a new token budget manager
    pub fn new(config: ContextBudgetConfig) -> Result<Self, BudgetError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self {
            config: ContextBudgetConfig::default(),
        }
    }

    /// Allocate tokens for the parts of an assembled context
    pub fn allocate(
        &self,
        system_tokens: usize,
        summary_tokens: usize,
        history_tokens: usize,
        user_message_tokens: usize,
    ) -> Result<BudgetAllocation, BudgetError> {
        let response_reserve = self.config.max_response;
        let total = system_tokens
            + summary_tokens
            + history_tokens
            + user_message_tokens
            + response_reserve;

        self.check_budget(total)?;

        Ok(BudgetAllocation {
            system_tokens,
            summary_tokens,
            history_tokens,
            user_message_tokens,
            response_reserve,
            total_allocated: total,
            remaining: self.config.max_context - total,
        })
    }

    /// Check if a given token count fits within the context window
    pub fn check_budget(&self, tokens: usize) -> Result<(), BudgetError> {
        if tokens > self.config.max_context {
            return Err(BudgetError::BudgetExceeded {
                used: tokens,
                max: self.config.max_context,
            });
        }
        Ok(())
    }

    /// Prompt tokens still available once the response is reserved
    pub fn prompt_capacity(&self) -> usize {
        self.config.max_context - self.config.max_response
    }

    /// Cut `text` so its estimate is at most `max_tokens`.
    ///
    /// Cuts on a char boundary; a surrogate pair that would straddle the
    /// limit is dropped whole.
    pub fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        if estimate_tokens(text) <= max_tokens {
            return text.to_string();
        }

        let max_units = max_tokens * CHARS_PER_TOKEN;
        let mut units = 0usize;
        let mut end = 0usize;
        for (idx, ch) in text.char_indices() {
            let width = ch.len_utf16();
            if units + width > max_units {
                break;
            }
            units += width;
            end = idx + ch.len_utf8();
        }
        text[..end].to_string()
    }

    pub fn truncate_system_prompt(&self, text: &str) -> String {
        self.truncate_to_tokens(text, self.config.max_system_prompt)
    }

    pub fn truncate_user_message(&self, text: &str) -> String {
        self.truncate_to_tokens(text, self.config.max_user_message)
    }

    pub fn truncate_summary(&self, text: &str) -> String {
        self.truncate_to_tokens(text, self.config.max_summary)
    }

    /// Get the maximum total tokens
    pub fn max_context(&self) -> usize {
        self.config.max_context
    }

    /// Get the configuration
    pub fn config(&self) -> &ContextBudgetConfig {
        &self.config
    }
}

impl Default for TokenBudgetManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}
