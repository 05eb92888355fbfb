//! Model pricing and cost derivation.
//!
//! Per-agent `cost_usd` metrics are derived from a [`PriceTable`] mapping
//! model identifiers to USD rates per 1,000 input/output tokens. The default
//! table covers the Anthropic models this crate has been used with; callers
//! running other models register their own rows with
//! [`PriceTable::with_model`]. Unknown models cost zero and log a warning so
//! a misconfigured table shows up in aggregate cost reports as exactly $0
//! rather than a silently wrong number.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// USD rates for one model, per 1,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    /// Dollars per 1,000 prompt tokens.
    pub input_per_1k: f64,
    /// Dollars per 1,000 completion tokens.
    pub output_per_1k: f64,
}

lazy_static! {
    static ref DEFAULT_PRICES: HashMap<String, ModelPrice> = {
        let mut m = HashMap::new();
        m.insert(
            "claude-3-haiku-20240307".to_string(),
            ModelPrice { input_per_1k: 0.00025, output_per_1k: 0.00125 },
        );
        m.insert(
            "claude-3-5-sonnet-20241022".to_string(),
            ModelPrice { input_per_1k: 0.003, output_per_1k: 0.015 },
        );
        m.insert(
            "claude-3-opus-20240229".to_string(),
            ModelPrice { input_per_1k: 0.015, output_per_1k: 0.075 },
        );
        m
    };
}

/// A model → price lookup used to turn token counts into dollar costs.
///
/// # Examples
///
/// ```
/// use agentdag::PriceTable;
///
/// // Default rows are keyed by real model identifiers.
/// let table = PriceTable::default();
/// assert!(table.price_for("claude-3-haiku-20240307").is_some());
///
/// // Tests and custom deployments register synthetic rows.
/// let table = PriceTable::empty().with_model("my-model", 0.04, 0.03);
/// let cost = table.cost_usd("my-model", 10, 20);
/// assert!((cost - 0.001).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl PriceTable {
    /// A table with no rows. Every lookup misses and costs zero.
    pub fn empty() -> Self {
        Self { prices: HashMap::new() }
    }

    /// Register (or override) the rates for one model (builder pattern).
    /// Rates are dollars per 1,000 tokens.
    pub fn with_model(
        mut self,
        model: impl Into<String>,
        input_per_1k: f64,
        output_per_1k: f64,
    ) -> Self {
        self.prices
            .insert(model.into(), ModelPrice { input_per_1k, output_per_1k });
        self
    }

    /// Look up the rates for a model, if registered.
    pub fn price_for(&self, model: &str) -> Option<&ModelPrice> {
        self.prices.get(model)
    }

    /// Derive the dollar cost of one invocation from its token counts.
    ///
    /// Unknown models cost `0.0`; a warning is logged so the gap is visible
    /// without poisoning aggregate sums.
    pub fn cost_usd(&self, model: &str, input_tokens: usize, output_tokens: usize) -> f64 {
        match self.prices.get(model) {
            Some(price) => {
                (input_tokens as f64 / 1000.0) * price.input_per_1k
                    + (output_tokens as f64 / 1000.0) * price.output_per_1k
            }
            None => {
                log::warn!("no price registered for model '{}'; cost recorded as $0", model);
                0.0
            }
        }
    }
}

impl Default for PriceTable {
    /// The built-in table of known Anthropic models.
    fn default() -> Self {
        Self { prices: DEFAULT_PRICES.clone() }
    }
}
