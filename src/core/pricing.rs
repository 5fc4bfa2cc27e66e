//! Price tables and cost estimation.
//!
//! Each vendor has an ordered list of substring rules and a fallback tier.
//! The first rule whose pattern occurs in the (lowercased) model identifier
//! wins, so more specific patterns must come first (`gpt-4o-mini` before
//! `gpt-4o`). Models that match nothing use the vendor's fallback; estimation
//! never fails.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::provider::Provider;

/// Pricing snapshot shipped with this build.
pub const PRICING_VERSION: &str = "2026-02";

const PER_MILLION: f64 = 1_000_000.0;

// =============================================================================
// Cost Formulas
// =============================================================================

/// How a tier turns token counts into money.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostFormula {
    /// Separate input/output prices per million tokens.
    PerMillion { input: f64, output: f64 },
    /// One price per million total tokens.
    ///
    /// Used for audio models where the usage API reports tokens as a proxy
    /// for duration.
    PerMillionTotal { rate: f64 },
}

impl CostFormula {
    /// Shorthand for a split input/output tier.
    #[must_use]
    pub const fn split(input: f64, output: f64) -> Self {
        Self::PerMillion { input, output }
    }

    /// Apply the formula.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn apply(self, input_tokens: u64, output_tokens: u64) -> f64 {
        match self {
            Self::PerMillion { input, output } => {
                (input_tokens as f64 / PER_MILLION) * input
                    + (output_tokens as f64 / PER_MILLION) * output
            }
            Self::PerMillionTotal { rate } => {
                (input_tokens.saturating_add(output_tokens) as f64 / PER_MILLION) * rate
            }
        }
    }
}

// =============================================================================
// Rules and Tables
// =============================================================================

/// One substring match rule.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRule {
    /// Lowercase substring to look for in the model identifier.
    pub pattern: String,
    pub formula: CostFormula,
}

impl PriceRule {
    #[must_use]
    pub fn new(pattern: &str, formula: CostFormula) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            formula,
        }
    }
}

/// Ordered rules plus fallback for a single vendor.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorPrices {
    pub rules: Vec<PriceRule>,
    pub fallback: CostFormula,
}

/// Which tier a model resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceMatch<'a> {
    /// Matched pattern, or `None` when the fallback tier was used.
    pub pattern: Option<&'a str>,
    pub formula: CostFormula,
}

/// Per-vendor price tables.
#[derive(Debug, Clone)]
pub struct PriceTable {
    vendors: HashMap<Provider, VendorPrices>,
    /// Identifies the pricing snapshot.
    pub version: String,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::current()
    }
}

impl PriceTable {
    /// Tables for all supported vendors (USD per million tokens).
    #[must_use]
    pub fn current() -> Self {
        let mut vendors = HashMap::new();

        vendors.insert(
            Provider::Anthropic,
            VendorPrices {
                rules: vec![
                    PriceRule::new("opus", CostFormula::split(15.0, 75.0)),
                    PriceRule::new("sonnet", CostFormula::split(3.0, 15.0)),
                    PriceRule::new("haiku", CostFormula::split(0.25, 1.25)),
                ],
                // Sonnet-tier
                fallback: CostFormula::split(3.0, 15.0),
            },
        );

        vendors.insert(
            Provider::OpenAI,
            VendorPrices {
                rules: vec![
                    PriceRule::new("gpt-4o-mini", CostFormula::split(0.15, 0.60)),
                    PriceRule::new("gpt-4o", CostFormula::split(2.50, 10.0)),
                    PriceRule::new("o1", CostFormula::split(10.0, 40.0)),
                    PriceRule::new("o3", CostFormula::split(10.0, 40.0)),
                    PriceRule::new("whisper", CostFormula::PerMillionTotal { rate: 0.006 }),
                ],
                fallback: CostFormula::split(2.50, 10.0),
            },
        );

        vendors.insert(
            Provider::Google,
            VendorPrices {
                rules: vec![
                    PriceRule::new("flash", CostFormula::split(0.10, 0.40)),
                    PriceRule::new("pro", CostFormula::split(1.25, 5.0)),
                ],
                fallback: CostFormula::split(0.10, 0.40),
            },
        );

        vendors.insert(
            Provider::XAi,
            VendorPrices {
                rules: vec![
                    PriceRule::new("grok-3-mini", CostFormula::split(0.30, 0.50)),
                    PriceRule::new("grok", CostFormula::split(3.0, 15.0)),
                ],
                fallback: CostFormula::split(3.0, 15.0),
            },
        );

        Self {
            vendors,
            version: PRICING_VERSION.to_string(),
        }
    }

    /// Build a table from explicit vendor entries.
    #[must_use]
    pub fn with_vendors(version: &str, vendors: HashMap<Provider, VendorPrices>) -> Self {
        Self {
            vendors,
            version: version.to_string(),
        }
    }

    /// Prices for one vendor.
    #[must_use]
    pub fn vendor(&self, provider: Provider) -> Option<&VendorPrices> {
        self.vendors.get(&provider)
    }

    /// Resolve the tier for a model; first matching rule wins.
    #[must_use]
    pub fn lookup(&self, provider: Provider, model: &str) -> PriceMatch<'_> {
        let Some(prices) = self.vendors.get(&provider) else {
            return PriceMatch {
                pattern: None,
                formula: CostFormula::split(0.0, 0.0),
            };
        };

        let model = model.to_lowercase();
        prices
            .rules
            .iter()
            .find(|rule| model.contains(rule.pattern.as_str()))
            .map_or(
                PriceMatch {
                    pattern: None,
                    formula: prices.fallback,
                },
                |rule| PriceMatch {
                    pattern: Some(rule.pattern.as_str()),
                    formula: rule.formula,
                },
            )
    }

    /// Estimate the cost of a model's usage in USD.
    #[must_use]
    pub fn estimate(
        &self,
        provider: Provider,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> f64 {
        let matched = self.lookup(provider, model);
        if matched.pattern.is_none() {
            tracing::trace!(
                provider = provider.cli_name(),
                model,
                "No price rule matched, using vendor default"
            );
        }
        matched.formula.apply(input_tokens, output_tokens)
    }
}

static CURRENT: LazyLock<PriceTable> = LazyLock::new(PriceTable::current);

/// Estimate cost with the built-in price table.
#[must_use]
pub fn estimate_cost(provider: Provider, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    CURRENT.estimate(provider, model, input_tokens, output_tokens)
}
