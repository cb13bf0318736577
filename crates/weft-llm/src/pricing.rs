//! Approximate per-model pricing.
//!
//! Costs are estimates: (input + output tokens) × rate per 1000 tokens,
//! keyed by model name prefix. Unknown models get the default rate.

use weft_core::types::TokenUsage;

/// USD per 1000 tokens, longest-prefix match on the model id.
const PRICE_TABLE: &[(&str, f64)] = &[
    ("gpt-4o-mini", 0.000_6),
    ("gpt-4o", 0.01),
    ("gpt-4-turbo", 0.02),
    ("gpt-4", 0.045),
    ("gpt-3.5-turbo", 0.001_5),
    ("claude-3-opus", 0.045),
    ("claude-3-5-sonnet", 0.009),
    ("claude-3-sonnet", 0.009),
    ("claude-3-haiku", 0.000_75),
    ("gemini-1.5-pro", 0.007),
    ("gemini-1.5-flash", 0.000_45),
];

const DEFAULT_RATE: f64 = 0.002;

/// Rate per 1000 tokens for a model id.
pub fn rate_per_1k(model_id: &str) -> f64 {
    PRICE_TABLE
        .iter()
        .filter(|(prefix, _)| model_id.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_RATE)
}

/// Approximate cost of one call in USD.
pub fn cost(model_id: &str, usage: &TokenUsage) -> f64 {
    usage.total() as f64 / 1000.0 * rate_per_1k(model_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        assert!(rate_per_1k("gpt-4o-mini-2024") < rate_per_1k("gpt-4o-2024"));
        assert!(rate_per_1k("gpt-4-turbo-preview") < rate_per_1k("gpt-4-0613"));
    }

    #[test]
    fn unknown_model_gets_default_rate() {
        assert!((rate_per_1k("totally-new-model") - DEFAULT_RATE).abs() < f64::EPSILON);
    }

    #[test]
    fn cost_scales_with_total_tokens() {
        let usage = TokenUsage::new(500, 500);
        let c = cost("gpt-3.5-turbo", &usage);
        assert!((c - 0.001_5).abs() < 1e-9);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        assert_eq!(cost("gpt-4", &TokenUsage::default()), 0.0);
    }
}
