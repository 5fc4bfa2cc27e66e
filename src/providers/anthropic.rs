//! Anthropic provider adapter.
//!
//! - Usage: organization usage endpoint (requires an admin-scoped key; regular
//!   keys get 401/403, which is reported as no data).
//! - Rate limits: read from the response headers of a `count_tokens` call,
//!   which is free and does not consume message quota.
//!
//! Auth is `x-api-key` plus the `anthropic-version` header.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use super::{AdapterContext, UsageAdapter};
use crate::core::http::{fetch_json, send_checked};
use crate::core::models::{Fetched, ModelUsageRecord, RateLimitState};
use crate::core::provider::Provider;
use crate::error::{Result, TokenMeterError};
use crate::util::time::parse_reset;

/// Anthropic API base URL.
pub const API_BASE: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";

/// Model named in the rate-limit probe body.
const PROBE_MODEL: &str = "claude-sonnet-4-20250514";

// Header spellings, newest first.
const REQUESTS_LIMIT: &[&str] = &["anthropic-ratelimit-requests-limit", "x-ratelimit-limit-requests"];
const REQUESTS_REMAINING: &[&str] = &[
    "anthropic-ratelimit-requests-remaining",
    "x-ratelimit-remaining-requests",
];
const REQUESTS_RESET: &[&str] = &["anthropic-ratelimit-requests-reset", "x-ratelimit-reset-requests"];
const TOKENS_LIMIT: &[&str] = &["anthropic-ratelimit-tokens-limit", "x-ratelimit-limit-tokens"];
const TOKENS_REMAINING: &[&str] = &[
    "anthropic-ratelimit-tokens-remaining",
    "x-ratelimit-remaining-tokens",
];

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct UsageResponse {
    #[serde(default)]
    data: Vec<UsageEntry>,
}

#[derive(Debug, Deserialize)]
struct UsageEntry {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

// =============================================================================
// Adapter
// =============================================================================

/// Adapter for the Anthropic API.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    ctx: AdapterContext,
    base_url: String,
}

impl AnthropicAdapter {
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
        let day = date.format("%Y-%m-%d");
        let url = format!(
            "{}/v1/organizations/usage?start_date={day}&end_date={day}",
            self.base_url
        );
        tracing::debug!(%url, "Fetching Anthropic usage");

        let request = self
            .ctx
            .client
            .get(&url)
            .header("x-api-key", credential)
            .header("anthropic-version", API_VERSION);
        let response: UsageResponse =
            fetch_json(Provider::Anthropic, request, self.ctx.timeout).await?;

        Ok(self.parse_usage(response))
    }

    fn parse_usage(&self, response: UsageResponse) -> Vec<ModelUsageRecord> {
        response
            .data
            .into_iter()
            .filter_map(|entry| {
                let model = entry.model?;
                let input = entry.input_tokens?;
                let output = entry.output_tokens?;
                let cost = self
                    .ctx
                    .prices
                    .estimate(Provider::Anthropic, &model, input, output);
                Some(ModelUsageRecord::new(model, input, output, cost))
            })
            .collect()
    }

    async fn rate_limit(&self, credential: &str) -> Result<RateLimitState> {
        let url = format!("{}/v1/messages/count_tokens", self.base_url);
        let body = json!({
            "model": PROBE_MODEL,
            "messages": [{ "role": "user", "content": "hi" }],
        });

        let request = self
            .ctx
            .client
            .post(&url)
            .header("x-api-key", credential)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        let response = send_checked(Provider::Anthropic, request, self.ctx.timeout).await?;

        let state = parse_rate_limit_headers(response.headers(), Utc::now());
        if state.is_empty() {
            return Err(TokenMeterError::ParseResponse(
                "no rate-limit headers in response".to_string(),
            ));
        }
        Ok(state)
    }
}

#[async_trait]
impl UsageAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn fetch_usage(
        &self,
        credential: &str,
        date: NaiveDate,
    ) -> Fetched<Vec<ModelUsageRecord>> {
        Fetched::from_result(Provider::Anthropic, "usage", self.usage(credential, date).await)
    }

    async fn fetch_rate_limit(&self, credential: &str) -> Fetched<RateLimitState> {
        Fetched::from_result(
            Provider::Anthropic,
            "rate_limit",
            self.rate_limit(credential).await,
        )
    }
}

// =============================================================================
// Header Parsing
// =============================================================================

fn header_value<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
}

fn header_u64(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    header_value(headers, names).and_then(|v| v.trim().parse().ok())
}

/// Extract rate-limit state from response headers.
#[must_use]
pub fn parse_rate_limit_headers(headers: &HeaderMap, now: DateTime<Utc>) -> RateLimitState {
    RateLimitState {
        requests_remaining: header_u64(headers, REQUESTS_REMAINING),
        requests_limit: header_u64(headers, REQUESTS_LIMIT),
        tokens_remaining: header_u64(headers, TOKENS_REMAINING),
        tokens_limit: header_u64(headers, TOKENS_LIMIT),
        resets_at: header_value(headers, REQUESTS_RESET).and_then(|v| parse_reset(v, now)),
    }
}
