//! LLM-based summarization of older conversation turns

use super::models::{Message, Role};
use super::token_budget::TokenBudgetManager;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of the synthesized entry that replaces summarized turns
pub const SUMMARY_PREFIX: &str = "Summary of earlier conversation:";

/// Build the system-role entry that stands in for summarized messages
pub fn summary_message(summary: &str) -> Message {
    Message::system(format!("{}\n{}", SUMMARY_PREFIX, summary))
}

/// Summarizer trait for different summarization strategies
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Condense `messages` into a summary of at most `max_tokens`
    async fn summarize(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> Result<String, SummarizerError>;
}

/// Configuration for LLM summarizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token for the completion API
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt; 0 sends exactly one request
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> usize {
    3
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
        }
    }
}

impl SummarizerConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// LLM-based summarizer using an OpenAI-compatible API
pub struct LlmSummarizer {
    client: Client,
    config: SummarizerConfig,
}

impl LlmSummarizer {
    /// Create a new LLM summarizer
    pub fn new(config: SummarizerConfig) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SummarizerError::InitializationError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_prompt(&self, messages: &[Message], max_tokens: usize) -> String {
        format!(
            "Summarize the following aquarium coaching conversation into a concise brief. \
            Keep tank details, water parameter values, livestock, problems raised and advice \
            already given. Keep the summary under {} tokens.\n\n{}",
            max_tokens,
            render_transcript(messages)
        )
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> Result<String, SummarizerError> {
        if messages.is_empty() {
            return Ok(String::new());
        }

        debug!("Summarizing {} messages, target: {} tokens", messages.len(), max_tokens);

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System.as_str().to_string(),
                    content: "You are a concise summarizer for an aquarium care assistant."
                        .to_string(),
                },
                ChatMessage {
                    role: Role::User.as_str().to_string(),
                    content: self.build_prompt(messages, max_tokens),
                },
            ],
            max_tokens: Some(max_tokens),
            temperature: Some(self.config.temperature),
        };

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} for summarization", attempt);
                tokio::time::sleep(Duration::from_millis(100 * (1u64 << attempt.min(10)))).await;
            }

            let mut req = self.client.post(&self.config.endpoint).json(&request);

            if let Some(ref api_key) = self.config.api_key {
                req = req.bearer_auth(api_key.expose_secret());
            }

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(SummarizerError::NetworkError(e.to_string()));
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                last_error = Some(SummarizerError::ApiError(format!("HTTP {}: {}", status, body)));
                continue;
            }

            match response.json::<ChatCompletionResponse>().await {
                Ok(resp) => match resp.choices.into_iter().next() {
                    Some(choice) => {
                        debug!("Summarization successful");
                        return Ok(choice.message.content);
                    }
                    None => {
                        last_error =
                            Some(SummarizerError::ApiError("No choices in response".to_string()));
                    }
                },
                Err(e) => {
                    last_error = Some(SummarizerError::ApiError(format!(
                        "Failed to parse response: {}",
                        e
                    )));
                }
            }
        }

        warn!("Summarization failed after {} attempts", self.config.max_retries + 1);
        Err(last_error.unwrap_or(SummarizerError::Unknown))
    }
}

/// Offline fallback that renders the transcript and cuts it to size
#[derive(Debug, Clone, Default)]
pub struct ConcatenationSummarizer {
    budget: TokenBudgetManager,
}

impl ConcatenationSummarizer {
    pub fn new(budget: TokenBudgetManager) -> Self {
        Self { budget }
    }

    /// Synchronous form used when the primary summarizer has failed
    pub fn render(&self, messages: &[Message], max_tokens: usize) -> String {
        self.budget
            .truncate_to_tokens(&render_transcript(messages), max_tokens)
    }
}

#[async_trait]
impl Summarizer for ConcatenationSummarizer {
    async fn summarize(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> Result<String, SummarizerError> {
        Ok(self.render(messages, max_tokens))
    }
}

fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role(), m.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarizer errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SummarizerError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unknown error")]
    Unknown,
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
