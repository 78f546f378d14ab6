//! Context management with token budget enforcement
//!
//! Estimates token usage with a fixed character heuristic, decides when chat
//! history must be summarized, and assembles bounded message sequences for
//! the completion API.

pub mod assembler;
pub mod models;
pub mod summarization;
pub mod summarizer;
pub mod summary_cache;
pub mod token_budget;
pub mod token_estimator;

pub use assembler::{AssembledContext, AssemblyRequest, ContextAssembler};
pub use models::{Message, Role, SummarizationSplit};
pub use summarization::{
    calculate_summarization_split, needs_summarization, SummarizationPolicy, MIN_RECENT_MESSAGES,
};
pub use summarizer::{
    summary_message, ConcatenationSummarizer, LlmSummarizer, Summarizer, SummarizerConfig,
    SummarizerError,
};
pub use summary_cache::{CachedSummarizer, SummaryCacheConfig};
pub use token_budget::{BudgetAllocation, BudgetError, ContextBudgetConfig, TokenBudgetManager};
pub use token_estimator::{
    estimate_message_tokens, estimate_tokens, CharHeuristicEstimator, TiktokenEstimator,
    TokenEstimator,
};
