//! Summary cache keyed by the exact messages being summarized

use super::models::Message;
use super::summarizer::{Summarizer, SummarizerError};
use crate::metrics::METRICS;
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

/// Summary cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_entries() -> u64 {
    1000
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for SummaryCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl SummaryCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Wraps a summarizer so the same history prefix is only summarized once
pub struct CachedSummarizer<S> {
    inner: S,
    cache: Cache<String, String>,
}

impl<S: Summarizer> CachedSummarizer<S> {
    pub fn new(inner: S, config: &SummaryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl())
            .build();
        Self { inner, cache }
    }

    /// Number of cached summaries
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

/// SHA-256 over roles, contents and the token limit
pub fn cache_key(messages: &[Message], max_tokens: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(max_tokens.to_le_bytes());
    for message in messages {
        hasher.update(message.role().as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update((message.content().len() as u64).to_le_bytes());
        hasher.update(message.content().as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[async_trait]
impl<S: Summarizer> Summarizer for CachedSummarizer<S> {
    async fn summarize(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> Result<String, SummarizerError> {
        let key = cache_key(messages, max_tokens);

        if let Some(summary) = self.cache.get(&key).await {
            debug!("Summary cache hit for {} messages", messages.len());
            METRICS.record_summary_cache(true);
            return Ok(summary);
        }

        METRICS.record_summary_cache(false);
        let summary = self.inner.summarize(messages, max_tokens).await?;
        self.cache.insert(key, summary.clone()).await;
        Ok(summary)
    }
}
