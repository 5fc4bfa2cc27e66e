//! Provider adapters.
//!
//! Each vendor has its own submodule that knows the vendor's endpoints, auth
//! headers and response shapes. Adapters are best-effort: every failure is
//! reported as [`Fetched::NoData`], never as an error.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod xai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::core::http::build_client;
use crate::core::models::{Fetched, ModelUsageRecord, RateLimitState};
use crate::core::pricing::PriceTable;
use crate::core::provider::Provider;
use crate::error::Result;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAIAdapter;
pub use xai::XAiAdapter;

/// Fetches usage (and optionally rate-limit state) for one vendor.
#[async_trait]
pub trait UsageAdapter: Send + Sync {
    /// The vendor this adapter talks to.
    fn provider(&self) -> Provider;

    /// Per-model usage for one UTC calendar day.
    async fn fetch_usage(&self, credential: &str, date: NaiveDate)
    -> Fetched<Vec<ModelUsageRecord>>;

    /// Current request quota, probed with a dedicated low-cost request.
    async fn fetch_rate_limit(&self, _credential: &str) -> Fetched<RateLimitState> {
        Fetched::NoData("rate limits not exposed".to_string())
    }
}

/// Shared dependencies handed to every adapter.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub client: Client,
    /// Per-request timeout the client was built with.
    pub timeout: Duration,
    pub prices: Arc<PriceTable>,
}

impl AdapterContext {
    /// Build a context with a fresh client and the built-in price table.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            timeout,
            prices: Arc::new(PriceTable::current()),
        })
    }
}

/// One adapter per supported provider, in display order.
#[must_use]
pub fn default_adapters(ctx: &AdapterContext) -> Vec<Arc<dyn UsageAdapter>> {
    vec![
        Arc::new(AnthropicAdapter::new(ctx.clone())),
        Arc::new(OpenAIAdapter::new(ctx.clone())),
        Arc::new(GoogleAdapter),
        Arc::new(XAiAdapter),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_adapters_cover_every_provider_in_order() {
        let ctx = AdapterContext::new(Duration::from_secs(5)).unwrap();
        let providers: Vec<Provider> = default_adapters(&ctx)
            .iter()
            .map(|adapter| adapter.provider())
            .collect();
        assert_eq!(providers, Provider::ALL);
    }
}
