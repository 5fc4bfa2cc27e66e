//! Google AI provider adapter.
//!
//! The Gemini API has no billing or usage endpoint reachable with an API key,
//! so this adapter reports an empty usage list without touching the network.
//! A configured key still marks the provider as enabled.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::UsageAdapter;
use crate::core::models::{Fetched, ModelUsageRecord};
use crate::core::provider::Provider;

/// No-op adapter for Google AI.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleAdapter;

#[async_trait]
impl UsageAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn fetch_usage(&self, _credential: &str, _date: NaiveDate) -> Fetched<Vec<ModelUsageRecord>> {
        Fetched::Data(Vec::new())
    }
}
