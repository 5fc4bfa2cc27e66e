//! Core data models for usage snapshots and rate limits.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::provider::Provider;
use crate::error::Result;

// =============================================================================
// Fetch Result
// =============================================================================

/// Outcome of a best-effort provider fetch.
///
/// Adapters never return errors to the scheduler. A failure of any kind
/// (transport, HTTP status, malformed body) becomes `NoData`, which the
/// scheduler treats as "keep what we had".
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// Fresh data from the vendor.
    Data(T),
    /// Nothing usable this time; carries a short reason for logs.
    NoData(String),
}

impl<T> Fetched<T> {
    /// Convert an adapter-internal result into a fetch outcome, logging the failure.
    pub fn from_result(provider: Provider, what: &str, result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Data(value),
            Err(err) => {
                tracing::warn!(
                    provider = provider.cli_name(),
                    fetch = what,
                    error = %err,
                    code = err.error_code(),
                    "Fetch failed, treating as no data"
                );
                Self::NoData(err.to_string())
            }
        }
    }

    /// Whether this outcome carries data.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    /// Take the data, if any.
    #[must_use]
    pub fn data(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            Self::NoData(_) => None,
        }
    }
}

// =============================================================================
// Model Usage
// =============================================================================

/// Token usage and estimated cost for one model over the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsageRecord {
    /// Vendor-specific model identifier.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Estimated cost in USD.
    pub cost_usd: f64,
}

impl ModelUsageRecord {
    /// Create a record. Negative or non-finite costs are clamped to zero.
    #[must_use]
    pub fn new(model: impl Into<String>, input_tokens: u64, output_tokens: u64, cost_usd: f64) -> Self {
        Self {
            model: model.into(),
            input_tokens,
            output_tokens,
            cost_usd: if cost_usd.is_finite() { cost_usd.max(0.0) } else { 0.0 },
        }
    }

    /// Total tokens (input + output).
    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

// =============================================================================
// Rate Limits
// =============================================================================

/// Request/token quota state read from vendor response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub requests_remaining: Option<u64>,
    pub requests_limit: Option<u64>,
    pub tokens_remaining: Option<u64>,
    pub tokens_limit: Option<u64>,
    /// When the request window resets.
    pub resets_at: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// Fraction of the request quota already consumed: `1 - remaining/limit`.
    ///
    /// Defined only when both values are present and the limit is positive.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_ratio(&self) -> Option<f64> {
        match (self.requests_remaining, self.requests_limit) {
            (Some(remaining), Some(limit)) if limit > 0 => {
                Some(1.0 - (remaining as f64 / limit as f64))
            }
            _ => None,
        }
    }

    /// Whether any header was actually present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.requests_remaining.is_none()
            && self.requests_limit.is_none()
            && self.tokens_remaining.is_none()
            && self.tokens_limit.is_none()
            && self.resets_at.is_none()
    }
}

// =============================================================================
// Provider Snapshot
// =============================================================================

/// Most recent usage/cost state for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsageSnapshot {
    pub provider: Provider,
    /// Per-model usage, in the order the adapter returned it.
    pub models: Vec<ModelUsageRecord>,
    /// Total estimated cost for the period in USD.
    pub total_cost_usd: f64,
    pub rate_limit: Option<RateLimitState>,
    pub updated_at: DateTime<Utc>,
    /// UTC day the usage figures cover.
    pub period: NaiveDate,
}

impl ProviderUsageSnapshot {
    /// Build a snapshot from model records; the total is derived.
    #[must_use]
    pub fn new(
        provider: Provider,
        models: Vec<ModelUsageRecord>,
        rate_limit: Option<RateLimitState>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let total_cost_usd = models.iter().map(|m| m.cost_usd).sum();
        Self {
            provider,
            models,
            total_cost_usd,
            rate_limit,
            updated_at,
            period: updated_at.date_naive(),
        }
    }

    /// Whether the usage figures belong to `date`.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.period == date
    }

    /// Total tokens across all models.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.models
            .iter()
            .map(ModelUsageRecord::total_tokens)
            .fold(0, u64::saturating_add)
    }

    /// Produce the successor snapshot from one provider's poll result.
    ///
    /// Each half (usage, rate limit) is superseded only by fresh data. Returns
    /// `None` when neither half has data, meaning the snapshot stays as is.
    /// Usage from an earlier `period` is never carried into a new one.
    #[must_use]
    pub fn supersede(
        previous: Option<&Self>,
        provider: Provider,
        usage: Fetched<Vec<ModelUsageRecord>>,
        rate_limit: Fetched<RateLimitState>,
        period: NaiveDate,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if !usage.is_data() && !rate_limit.is_data() {
            return None;
        }

        let models = match usage {
            Fetched::Data(models) => models,
            Fetched::NoData(_) => previous
                .filter(|p| p.covers(period))
                .map(|p| p.models.clone())
                .unwrap_or_default(),
        };
        let rate_limit = match rate_limit {
            Fetched::Data(state) => Some(state),
            Fetched::NoData(_) => previous.and_then(|p| p.rate_limit.clone()),
        };

        Some(Self {
            period,
            ..Self::new(provider, models, rate_limit, now)
        })
    }
}
