//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Context assembly metrics
    pub context_assemblies: CounterVec,
    pub assembled_tokens: Histogram,
    pub budget_remaining: Histogram,
    pub budget_overflows: Counter,

    // Summarization metrics
    pub summarizations: Counter,
    pub summarized_messages: Counter,
    pub summarizer_fallbacks: Counter,
    pub summary_cache_lookups: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let context_assemblies = register_counter_vec_with_registry!(
            Opts::new("context_assemblies_total", "Total context assemblies"),
            &["status"],
            registry
        )?;

        let assembled_tokens = register_histogram_with_registry!(
            "context_assembled_tokens",
            "Estimated prompt tokens per assembled context",
            registry
        )?;

        let budget_remaining = register_histogram_with_registry!(
            "context_budget_remaining",
            "Tokens remaining in the context window after assembly",
            registry
        )?;

        let budget_overflows = register_counter_with_registry!(
            Opts::new("context_budget_overflows_total", "Total context budget overflows"),
            registry
        )?;

        let summarizations = register_counter_with_registry!(
            Opts::new("context_summarizations_total", "Total history summarizations performed"),
            registry
        )?;

        let summarized_messages = register_counter_with_registry!(
            Opts::new(
                "context_summarized_messages_total",
                "Total messages folded into summaries"
            ),
            registry
        )?;

        let summarizer_fallbacks = register_counter_with_registry!(
            Opts::new(
                "context_summarizer_fallbacks_total",
                "Summaries produced by the concatenation fallback"
            ),
            registry
        )?;

        let summary_cache_lookups = register_counter_vec_with_registry!(
            Opts::new("summary_cache_lookups_total", "Summary cache lookups"),
            &["result"],
            registry
        )?;

        Ok(Self {
            registry,
            context_assemblies,
            assembled_tokens,
            budget_remaining,
            budget_overflows,
            summarizations,
            summarized_messages,
            summarizer_fallbacks,
            summary_cache_lookups,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record an assembled context
    pub fn record_assembly(&self, prompt_tokens: usize, remaining: usize) {
        self.context_assemblies.with_label_values(&["success"]).inc();
        self.assembled_tokens.observe(prompt_tokens as f64);
        self.budget_remaining.observe(remaining as f64);
    }

    /// Record an assembly rejected for exceeding the context window
    pub fn record_overflow(&self) {
        self.context_assemblies.with_label_values(&["overflow"]).inc();
        self.budget_overflows.inc();
    }

    /// Record a summarization event
    pub fn record_summarization(&self, messages: usize, fallback: bool) {
        self.summarizations.inc();
        self.summarized_messages.inc_by(messages as f64);
        if fallback {
            self.summarizer_fallbacks.inc();
        }
    }

    /// Record a summary cache lookup
    pub fn record_summary_cache(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.summary_cache_lookups.with_label_values(&[result]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
