//! Context assembler with token budget enforcement
//!
//! Turns a conversation history, a system prompt and a new user message into
//! the message sequence sent to the completion API:
//! - System prompt and user message are cut to their budgets
//! - History over the summarization threshold is split, and the oldest part
//!   is replaced by a single summary entry
//! - The result plus the response reserve never exceeds the context window

use super::models::{Message, SummarizationSplit};
use super::summarization::{calculate_summarization_split, SummarizationPolicy};
use super::summarizer::{
    summary_message, ConcatenationSummarizer, LlmSummarizer, Summarizer, SummarizerConfig,
};
use super::summary_cache::CachedSummarizer;
use super::token_budget::{BudgetAllocation, TokenBudgetManager};
use super::token_estimator::{estimate_message_tokens, message_cost};
use crate::config::Config;
use crate::error::Result;
use crate::metrics::METRICS;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Input for one assembled turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyRequest {
    pub conversation_id: Uuid,
    pub system_prompt: String,
    /// Prior turns, oldest first
    pub history: Vec<Message>,
    pub user_message: String,
}

impl AssemblyRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        history: Vec<Message>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: Uuid::new_v4(),
            system_prompt: system_prompt.into(),
            history,
            user_message: user_message.into(),
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: Uuid) -> Self {
        self.conversation_id = conversation_id;
        self
    }
}

/// Bounded context ready for the completion API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub conversation_id: Uuid,
    /// `[system] + [summary?] + retained history + [user]`
    pub messages: Vec<Message>,
    pub summary: Option<String>,
    pub split: Option<SummarizationSplit>,
    pub budget_allocation: BudgetAllocation,
}

impl AssembledContext {
    /// Estimated tokens of the emitted messages
    pub fn total_tokens(&self) -> usize {
        estimate_message_tokens(&self.messages)
    }

    /// Check the emitted messages plus the response reserve against a window
    pub fn is_within_budget(&self, max_tokens: usize) -> bool {
        self.budget_allocation.is_within_budget(max_tokens)
    }
}

struct Compacted {
    history: Vec<Message>,
    summary: Option<String>,
    split: Option<SummarizationSplit>,
}

/// Context assembler
pub struct ContextAssembler {
    budget_manager: TokenBudgetManager,
    policy: SummarizationPolicy,
    summarizer: Arc<dyn Summarizer>,
    fallback: ConcatenationSummarizer,
}

impl ContextAssembler {
    /// Create a new assembler with a custom summarizer
    pub fn new(budget_manager: TokenBudgetManager, summarizer: Arc<dyn Summarizer>) -> Self {
        let threshold = budget_manager.config().summarization_threshold;
        Self {
            policy: SummarizationPolicy::new(threshold, threshold),
            fallback: ConcatenationSummarizer::new(budget_manager.clone()),
            budget_manager,
            summarizer,
        }
    }

    /// Create with the concatenation summarizer (offline use and tests)
    pub fn with_concat_summarizer(budget_manager: TokenBudgetManager) -> Self {
        let summarizer = Arc::new(ConcatenationSummarizer::new(budget_manager.clone()));
        Self::new(budget_manager, summarizer)
    }

    /// Build from configuration: LLM summarizer behind the summary cache,
    /// falling back to concatenation when the client cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let budget_manager = TokenBudgetManager::new(config.budget.clone())?;

        let summarizer: Arc<dyn Summarizer> = match LlmSummarizer::new(config.summarizer.clone()) {
            Ok(llm) if config.summary_cache.enabled => {
                Arc::new(CachedSummarizer::new(llm, &config.summary_cache))
            }
            Ok(llm) => Arc::new(llm),
            Err(e) => {
                warn!("LLM summarizer initialization failed, falling back to concatenation: {}", e);
                Arc::new(ConcatenationSummarizer::new(budget_manager.clone()))
            }
        };

        Ok(Self::new(budget_manager, summarizer))
    }

    /// Create with the LLM summarizer, failing if the client cannot be built
    pub fn with_llm_summarizer(
        budget_manager: TokenBudgetManager,
        config: SummarizerConfig,
    ) -> Result<Self> {
        let summarizer = LlmSummarizer::new(config)?;
        Ok(Self::new(budget_manager, Arc::new(summarizer)))
    }

    /// Assemble a bounded context for one turn
    #[instrument(skip_all, fields(conversation_id = %request.conversation_id))]
    pub async fn assemble(&self, request: AssemblyRequest) -> Result<AssembledContext> {
        let AssemblyRequest {
            conversation_id,
            system_prompt,
            history,
            user_message,
        } = request;

        let system = Message::system(self.budget_manager.truncate_system_prompt(&system_prompt));
        let user = Message::user(self.budget_manager.truncate_user_message(&user_message));

        let system_tokens = message_cost(&system);
        let user_tokens = message_cost(&user);
        let history_tokens = estimate_message_tokens(&history);

        let over_window =
            system_tokens + history_tokens + user_tokens > self.budget_manager.prompt_capacity();

        debug!(
            "Token estimate: system={}, history={} ({} messages), user={}",
            system_tokens,
            history_tokens,
            history.len(),
            user_tokens
        );

        let split = self.policy.evaluate(&history).or_else(|| {
            if !over_window {
                return None;
            }
            debug!("Prompt over context window, compacting history under threshold");
            let split = calculate_summarization_split(&history, self.policy.target_tokens);
            (!split.is_trivial()).then_some(split)
        });

        let compacted = match split {
            Some(split) => self.compact(history, split).await,
            None => Compacted {
                history,
                summary: None,
                split: None,
            },
        };

        let summary_entry = compacted.summary.as_deref().map(summary_message);
        let summary_tokens = summary_entry.as_ref().map(message_cost).unwrap_or(0);
        let retained_tokens = estimate_message_tokens(&compacted.history);

        let allocation = match self.budget_manager.allocate(
            system_tokens,
            summary_tokens,
            retained_tokens,
            user_tokens,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                warn!("Context exceeds budget even after summarization: {}", e);
                METRICS.record_overflow();
                return Err(e.into());
            }
        };

        METRICS.record_assembly(allocation.prompt_tokens(), allocation.remaining);

        let mut messages = Vec::with_capacity(compacted.history.len() + 3);
        messages.push(system);
        messages.extend(summary_entry);
        messages.extend(compacted.history);
        messages.push(user);

        Ok(AssembledContext {
            conversation_id,
            messages,
            summary: compacted.summary,
            split: compacted.split,
            budget_allocation: allocation,
        })
    }

    /// Replace the oldest `split.summarize_messages` entries with a summary
    async fn compact(&self, mut history: Vec<Message>, split: SummarizationSplit) -> Compacted {
        let retained = history.split_off(split.summarize_messages);
        let summary = self.summarize(&history).await;

        Compacted {
            history: retained,
            summary: Some(summary),
            split: Some(split),
        }
    }

    async fn summarize(&self, older: &[Message]) -> String {
        let max_summary = self.budget_manager.config().max_summary;

        let (summary, fallback) = match self.summarizer.summarize(older, max_summary).await {
            Ok(summary) => (self.budget_manager.truncate_summary(&summary), false),
            Err(e) => {
                warn!("Summarizer failed, using concatenation fallback: {}", e);
                (self.fallback.render(older, max_summary), true)
            }
        };

        METRICS.record_summarization(older.len(), fallback);
        info!("Summarized {} older messages", older.len());
        summary
    }

    /// Get the budget manager
    pub fn budget_manager(&self) -> &TokenBudgetManager {
        &self.budget_manager
    }

    pub fn policy(&self) -> &SummarizationPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::Role;
    use crate::context::summarizer::{SummarizerError, SUMMARY_PREFIX};
    use crate::context::token_budget::{BudgetError, ContextBudgetConfig};
    use crate::error::ContextError;
    use async_trait::async_trait;

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(
            &self,
            _messages: &[Message],
            _max_tokens: usize,
        ) -> std::result::Result<String, SummarizerError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(
            &self,
            _messages: &[Message],
            _max_tokens: usize,
        ) -> std::result::Result<String, SummarizerError> {
            Err(SummarizerError::NetworkError("connection refused".to_string()))
        }
    }

    fn history(count: usize, chars: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                let body = format!("{:04}", i) + &"x".repeat(chars - 4);
                if i % 2 == 0 {
                    Message::user(body)
                } else {
                    Message::assistant(body)
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_short_history_passes_through() {
        let assembler = ContextAssembler::with_concat_summarizer(TokenBudgetManager::default());
        let request = AssemblyRequest::new("You are a coach.", history(4, 40), "Is 7.2 pH ok?");

        let ctx = assembler.assemble(request).await.unwrap();

        assert_eq!(ctx.messages.len(), 6);
        assert_eq!(ctx.messages[0].role(), Role::System);
        assert_eq!(ctx.messages[5].content(), "Is 7.2 pH ok?");
        assert!(ctx.summary.is_none());
        assert!(ctx.split.is_none());
        assert_eq!(ctx.total_tokens(), ctx.budget_allocation.prompt_tokens());
    }

    #[tokio::test]
    async fn test_long_history_is_summarized() {
        let assembler = ContextAssembler::new(
            TokenBudgetManager::default(),
            Arc::new(FixedSummarizer("Cycling a 60L tank; ammonia spikes.")),
        );
        // 30 messages of 504 tokens = 15120 > 8000
        let request = AssemblyRequest::new("You are a coach.", history(30, 2000), "What next?");

        let ctx = assembler.assemble(request).await.unwrap();

        let split = ctx.split.unwrap();
        assert_eq!(split.keep_messages, 10);
        assert_eq!(split.summarize_messages, 20);
        assert_eq!(ctx.messages.len(), 1 + 1 + 10 + 1);
        assert!(ctx.messages[1].content().starts_with(SUMMARY_PREFIX));
        // oldest retained message is number 20
        assert!(ctx.messages[2].content().starts_with("0020"));
        assert_eq!(ctx.summary.as_deref(), Some("Cycling a 60L tank; ammonia spikes."));
        assert!(ctx.is_within_budget(100_000));
    }

    #[tokio::test]
    async fn test_over_threshold_but_short_history_is_not_summarized() {
        let assembler = ContextAssembler::new(
            TokenBudgetManager::default(),
            Arc::new(FixedSummarizer("unused")),
        );
        let request = AssemblyRequest::new("sys", history(6, 8000), "hi");

        let ctx = assembler.assemble(request).await.unwrap();

        assert!(ctx.summary.is_none());
        assert_eq!(ctx.messages.len(), 8);
    }

    #[tokio::test]
    async fn test_summarizer_failure_falls_back() {
        let assembler =
            ContextAssembler::new(TokenBudgetManager::default(), Arc::new(FailingSummarizer));
        let request = AssemblyRequest::new("sys", history(30, 2000), "hi");

        let ctx = assembler.assemble(request).await.unwrap();

        let summary = ctx.summary.unwrap();
        assert!(summary.starts_with("user: 0000"));
        assert!(crate::context::token_estimator::estimate_tokens(&summary) <= 300);
    }

    #[tokio::test]
    async fn test_oversized_summary_is_truncated() {
        let long: &'static str = Box::leak("s".repeat(5_000).into_boxed_str());
        let assembler =
            ContextAssembler::new(TokenBudgetManager::default(), Arc::new(FixedSummarizer(long)));
        let request = AssemblyRequest::new("sys", history(30, 2000), "hi");

        let ctx = assembler.assemble(request).await.unwrap();

        assert_eq!(ctx.summary.unwrap().len(), 1200);
    }

    #[tokio::test]
    async fn test_overflow_after_summarization_is_rejected() {
        let config = ContextBudgetConfig {
            max_context: 20_000,
            ..Default::default()
        };
        let assembler =
            ContextAssembler::with_concat_summarizer(TokenBudgetManager::new(config).unwrap());
        // ten recent messages of 2504 tokens survive the floor
        let request = AssemblyRequest::new("sys", history(12, 10_000), "hi");

        let result = assembler.assemble(request).await;

        assert!(matches!(
            result,
            Err(ContextError::Budget(BudgetError::BudgetExceeded { max: 20_000, .. }))
        ));
    }

    #[tokio::test]
    async fn test_prompt_and_user_message_are_bounded() {
        let assembler = ContextAssembler::with_concat_summarizer(TokenBudgetManager::default());
        let request = AssemblyRequest::new("p".repeat(20_000), vec![], "u".repeat(10_000));

        let ctx = assembler.assemble(request).await.unwrap();

        assert_eq!(ctx.budget_allocation.system_tokens, 4_000 + 4);
        assert_eq!(ctx.budget_allocation.user_message_tokens, 2_000 + 4);
    }

    #[tokio::test]
    async fn test_conversation_id_is_carried() {
        let assembler = ContextAssembler::with_concat_summarizer(TokenBudgetManager::default());
        let id = Uuid::new_v4();
        let request = AssemblyRequest::new("sys", vec![], "hi").with_conversation_id(id);

        let ctx = assembler.assemble(request).await.unwrap();
        assert_eq!(ctx.conversation_id, id);
    }

    fn small_window() -> TokenBudgetManager {
        TokenBudgetManager::new(ContextBudgetConfig {
            max_context: 12_000,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_window_overflow_compacts_history_under_threshold() {
        let assembler =
            ContextAssembler::new(small_window(), Arc::new(FixedSummarizer("Tank notes.")));
        // 14 messages of 500 tokens: 7000, under the 8000 threshold
        let older = history(14, 1984);
        assert_eq!(estimate_message_tokens(&older), 7_000);
        // 2004 + 7000 + 2004 exceeds the 10_000 prompt capacity
        let request = AssemblyRequest::new("p".repeat(8_000), older, "u".repeat(8_000));

        let ctx = assembler.assemble(request).await.unwrap();

        let split = ctx.split.unwrap();
        assert_eq!(split.keep_messages, 10);
        assert_eq!(split.summarize_messages, 4);
        assert_eq!(ctx.summary.as_deref(), Some("Tank notes."));
        assert_eq!(ctx.budget_allocation.history_tokens, 5_000);
        assert!(ctx.is_within_budget(12_000));
        assert!(ctx.messages[2].content().starts_with("0004"));
    }

    #[tokio::test]
    async fn test_window_overflow_rejected_when_compaction_is_not_enough() {
        let assembler =
            ContextAssembler::new(small_window(), Arc::new(FixedSummarizer("Tank notes.")));
        let request =
            AssemblyRequest::new("p".repeat(16_000), history(14, 1984), "u".repeat(8_000));

        let result = assembler.assemble(request).await;

        assert!(matches!(
            result,
            Err(ContextError::Budget(BudgetError::BudgetExceeded { max: 12_000, .. }))
        ));
    }

    #[tokio::test]
    async fn test_under_window_and_threshold_is_untouched() {
        let assembler =
            ContextAssembler::new(small_window(), Arc::new(FixedSummarizer("unused")));
        let request = AssemblyRequest::new("sys", history(14, 1984), "hi");

        let ctx = assembler.assemble(request).await.unwrap();

        assert!(ctx.split.is_none());
        assert_eq!(ctx.messages.len(), 16);
    }

    #[test]
    fn test_with_llm_summarizer() {
        let assembler = ContextAssembler::with_llm_summarizer(
            TokenBudgetManager::default(),
            SummarizerConfig::default(),
        );
        assert!(assembler.is_ok());
    }

    #[test]
    fn test_from_default_config() {
        let assembler = ContextAssembler::from_config(&Config::default()).unwrap();
        assert_eq!(assembler.policy().threshold, 8_000);
        assert_eq!(assembler.budget_manager().max_context(), 100_000);
    }
}
