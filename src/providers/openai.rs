//! OpenAI provider adapter.
//!
//! Reads the legacy daily usage endpoint with a bearer token. The response
//! lists one entry per request bucket; entries are summed per model.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{AdapterContext, UsageAdapter};
use crate::core::http::fetch_json;
use crate::core::models::{Fetched, ModelUsageRecord};
use crate::core::provider::Provider;
use crate::error::Result;

/// OpenAI API base URL.
pub const API_BASE: &str = "https://api.openai.com";

const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Deserialize)]
struct UsageResponse {
    #[serde(default)]
    data: Vec<UsageBucket>,
}

#[derive(Debug, Deserialize)]
struct UsageBucket {
    #[serde(default)]
    snapshot_id: Option<String>,
    #[serde(default)]
    n_context_tokens_total: Option<u64>,
    #[serde(default)]
    n_generated_tokens_total: Option<u64>,
}

/// Adapter for the OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAIAdapter {
    ctx: AdapterContext,
    base_url: String,
}

impl OpenAIAdapter {
    #[must_use]
    pub fn new(ctx: AdapterContext) -> Self {
        Self {
            ctx,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point the adapter at a different host (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn usage(&self, credential: &str, date: NaiveDate) -> Result<Vec<ModelUsageRecord>> {
        let url = format!("{}/v1/usage?date={}", self.base_url, date.format("%Y-%m-%d"));
        tracing::debug!(%url, "Fetching OpenAI usage");

        let request = self.ctx.client.get(&url).bearer_auth(credential);
        let response: UsageResponse =
            fetch_json(Provider::OpenAI, request, self.ctx.timeout).await?;

        Ok(self.aggregate(response))
    }

    fn aggregate(&self, response: UsageResponse) -> Vec<ModelUsageRecord> {
        let mut totals: HashMap<String, (u64, u64)> = HashMap::new();
        for bucket in response.data {
            let model = bucket
                .snapshot_id
                .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
            let entry = totals.entry(model).or_default();
            entry.0 = entry.0.saturating_add(bucket.n_context_tokens_total.unwrap_or(0));
            entry.1 = entry.1.saturating_add(bucket.n_generated_tokens_total.unwrap_or(0));
        }

        let mut records: Vec<ModelUsageRecord> = totals
            .into_iter()
            .map(|(model, (input, output))| {
                let cost = self.ctx.prices.estimate(Provider::OpenAI, &model, input, output);
                ModelUsageRecord::new(model, input, output, cost)
            })
            .collect();

        // Highest cost first; model name keeps the order stable on ties.
        records.sort_by(|a, b| {
            b.cost_usd
                .total_cmp(&a.cost_usd)
                .then_with(|| a.model.cmp(&b.model))
        });
        records
    }
}

#[async_trait]
impl UsageAdapter for OpenAIAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn fetch_usage(
        &self,
        credential: &str,
        date: NaiveDate,
    ) -> Fetched<Vec<ModelUsageRecord>> {
        Fetched::from_result(Provider::OpenAI, "usage", self.usage(credential, date).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn adapter() -> OpenAIAdapter {
        OpenAIAdapter::new(AdapterContext::new(Duration::from_secs(5)).unwrap())
    }

    fn parse(json: &str) -> Vec<ModelUsageRecord> {
        adapter().aggregate(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn buckets_are_summed_per_model() {
        let records = parse(
            r#"{"data":[
                {"snapshot_id":"gpt-4o-2024-08-06","n_context_tokens_total":100000,"n_generated_tokens_total":20000},
                {"snapshot_id":"gpt-4o-2024-08-06","n_context_tokens_total":300000,"n_generated_tokens_total":30000},
                {"snapshot_id":"gpt-4o-mini","n_context_tokens_total":1000,"n_generated_tokens_total":100}
            ]}"#,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].model, "gpt-4o-2024-08-06");
        assert_eq!(records[0].input_tokens, 400_000);
        assert_eq!(records[0].output_tokens, 50_000);
        // 0.4M * 2.50 + 0.05M * 10 = 1.50
        assert!((records[0].cost_usd - 1.5).abs() < 1e-9);
    }

    #[test]
    fn sorted_by_cost_descending() {
        let records = parse(
            r#"{"data":[
                {"snapshot_id":"gpt-4o-mini","n_context_tokens_total":1000000,"n_generated_tokens_total":0},
                {"snapshot_id":"o1-preview","n_context_tokens_total":1000000,"n_generated_tokens_total":0}
            ]}"#,
        );
        assert_eq!(records[0].model, "o1-preview");
        assert_eq!(records[1].model, "gpt-4o-mini");
    }

    #[test]
    fn missing_fields_default() {
        let records = parse(r#"{"data":[{"n_context_tokens_total":10}]}"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model, "unknown");
        assert_eq!(records[0].input_tokens, 10);
        assert_eq!(records[0].output_tokens, 0);
    }

    #[test]
    fn empty_response_is_empty_usage() {
        assert!(parse("{}").is_empty());
        assert!(parse(r#"{"data":[]}"#).is_empty());
    }
}
