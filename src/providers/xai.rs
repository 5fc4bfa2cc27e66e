//! xAI provider adapter.
//!
//! xAI does not publish a usage API; usage is only visible in the console.
//! The adapter is an intentional no-op returning an empty list.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::UsageAdapter;
use crate::core::models::{Fetched, ModelUsageRecord};
use crate::core::provider::Provider;

/// No-op adapter for xAI.
#[derive(Debug, Clone, Copy, Default)]
pub struct XAiAdapter;

#[async_trait]
impl UsageAdapter for XAiAdapter {
    fn provider(&self) -> Provider {
        Provider::XAi
    }

    async fn fetch_usage(&self, _credential: &str, _date: NaiveDate) -> Fetched<Vec<ModelUsageRecord>> {
        Fetched::Data(Vec::new())
    }
}
