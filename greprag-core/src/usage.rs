//! Token and latency accounting for model calls.

use serde::{Deserialize, Serialize};

use crate::types::TokenUsage;

/// Accumulated usage for one run.
///
/// Counters only ever grow; an absent usage report still counts the call and its time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub calls: u64,
    pub elapsed_seconds: f64,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one model call.
    pub fn add(&mut self, usage: Option<&TokenUsage>, elapsed_seconds: f64) {
        if let Some(usage) = usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.completion_tokens += usage.completion_tokens;
            self.total_tokens += usage.total_tokens;
        }
        self.calls += 1;
        if elapsed_seconds.is_finite() && elapsed_seconds > 0.0 {
            self.elapsed_seconds += elapsed_seconds;
        }
    }

    /// Fold another run's totals into this one.
    pub fn merge(&mut self, other: &UsageStats) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.calls += other.calls;
        self.elapsed_seconds += other.elapsed_seconds;
    }

    /// Estimated cost in dollars given per-million-token prices.
    pub fn cost(&self, input_price_per_million: f64, output_price_per_million: f64) -> f64 {
        (self.prompt_tokens as f64 * input_price_per_million
            + self.completion_tokens as f64 * output_price_per_million)
            / 1_000_000.0
    }

    pub fn tokens_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.completion_tokens as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for UsageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} calls, {} tokens ({} in / {} out), {:.2}s, {:.1} tok/s",
            self.calls,
            self.total_tokens,
            self.prompt_tokens,
            self.completion_tokens,
            self.elapsed_seconds,
            self.tokens_per_second()
        )
    }
}
