//! Token accounting and cost estimates.

use crate::config::GeneratorConfig;
use serde::Serialize;

/// Tokens consumed by one API call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Running totals across the calls of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub api_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageCounters {
    /// Counters after one more call.
    #[must_use]
    pub fn record(self, usage: TokenUsage) -> Self {
        Self {
            api_calls: self.api_calls + 1,
            input_tokens: self.input_tokens + usage.input_tokens,
            output_tokens: self.output_tokens + usage.output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    pub fn input_cost(&self, tokens: u64) -> f64 {
        tokens as f64 / 1_000_000.0 * self.input_per_million
    }

    pub fn output_cost(&self, tokens: u64) -> f64 {
        tokens as f64 / 1_000_000.0 * self.output_per_million
    }
}

impl From<&GeneratorConfig> for Pricing {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            input_per_million: config.price_per_million_input,
            output_per_million: config.price_per_million_output,
        }
    }
}

/// Usage summary returned to the caller; costs rounded to 4 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageReport {
    pub api_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl UsageReport {
    pub fn new(counters: &UsageCounters, pricing: &Pricing) -> Self {
        let input_cost = pricing.input_cost(counters.input_tokens);
        let output_cost = pricing.output_cost(counters.output_tokens);

        Self {
            api_calls: counters.api_calls,
            input_tokens: counters.input_tokens,
            output_tokens: counters.output_tokens,
            total_tokens: counters.total_tokens(),
            input_cost: round4(input_cost),
            output_cost: round4(output_cost),
            total_cost: round4(input_cost + output_cost),
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
