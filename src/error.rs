//! Crate-wide error type

use crate::context::summarizer::SummarizerError;
use crate::context::token_budget::BudgetError;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors surfaced by context assembly and its supporting layers
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    Summarizer(#[from] SummarizerError),
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::Configuration(err.to_string())
    }
}
