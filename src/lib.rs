//! Context budgeting and conversation summarization for an aquarium coaching
//! assistant.
//!
//! The core is pure: [`context::estimate_tokens`],
//! [`context::estimate_message_tokens`], [`context::needs_summarization`] and
//! [`context::calculate_summarization_split`]. [`context::ContextAssembler`]
//! builds on them to emit bounded message sequences, delegating summary text
//! to an LLM collaborator.

pub mod coaching;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{ContextError, Result};

pub mod prelude {
    pub use crate::coaching::{
        analyze_trends, MaintenanceState, ParameterKind, ParameterReading, SystemPromptBuilder,
        TankSnapshot, UserPreferences, WaterType,
    };
    pub use crate::config::Config;
    pub use crate::context::{
        calculate_summarization_split, estimate_message_tokens, estimate_tokens,
        needs_summarization, AssembledContext, AssemblyRequest, BudgetAllocation,
        ContextAssembler, Message, Role, SummarizationSplit, Summarizer, TokenBudgetManager,
    };
    pub use crate::error::{ContextError, Result};
}
