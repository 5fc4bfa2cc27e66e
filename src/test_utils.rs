//! Test utilities for tokenmeter.
//!
//! Fakes for the aggregator's collaborators (adapters, credential store,
//! notification sink) plus data factories and a temp-dir helper.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokenmeter::test_utils::*;
//!
//! let adapter = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(3.41));
//! let credentials = MemoryCredentials::with(&[(Provider::Anthropic, "sk-test")]);
//! let sink = Arc::new(RecordingSink::default());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Utc};

use crate::core::credentials::CredentialStore;
use crate::core::models::{Fetched, ModelUsageRecord, ProviderUsageSnapshot, RateLimitState};
use crate::core::notify::NotificationSink;
use crate::core::provider::Provider;
use crate::error::Result;
use crate::providers::UsageAdapter;

// =============================================================================
// Test Data Factories
// =============================================================================

/// One model record with the given cost.
#[must_use]
pub fn make_test_record(model: &str, cost_usd: f64) -> ModelUsageRecord {
    ModelUsageRecord::new(model, 120_000, 8_000, cost_usd)
}

/// A snapshot whose total equals `cost_usd`.
#[must_use]
pub fn make_test_snapshot(provider: Provider, cost_usd: f64) -> ProviderUsageSnapshot {
    ProviderUsageSnapshot::new(
        provider,
        vec![make_test_record("test-model", cost_usd)],
        None,
        Utc::now(),
    )
}

/// Request quota state resetting in 12 minutes.
#[must_use]
pub fn make_test_rate_limit(remaining: u64, limit: u64) -> RateLimitState {
    RateLimitState {
        requests_remaining: Some(remaining),
        requests_limit: Some(limit),
        tokens_remaining: None,
        tokens_limit: None,
        resets_at: Some(Utc::now() + TimeDelta::minutes(12) + TimeDelta::seconds(30)),
    }
}

/// Sample config file with every section.
#[must_use]
pub fn make_test_config_toml() -> String {
    r"[budget]
daily_usd = 25.0
alert_threshold = 0.75
poll_interval_minutes = 10

[alerts]
budget_cooldown_minutes = 15
rate_limit_threshold = 0.95

[http]
timeout_seconds = 12

[output]
color = false
"
    .to_string()
}

// =============================================================================
// Fake Adapter
// =============================================================================

/// Scriptable adapter. Responses can be changed between polls.
#[derive(Debug)]
pub struct FakeAdapter {
    provider: Provider,
    usage: Mutex<Fetched<Vec<ModelUsageRecord>>>,
    rate_limit: Mutex<Fetched<RateLimitState>>,
    delay: Duration,
    calls: AtomicUsize,
    credentials_seen: Mutex<Vec<String>>,
}

impl FakeAdapter {
    /// Empty usage, no rate-limit data, no delay.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            usage: Mutex::new(Fetched::Data(Vec::new())),
            rate_limit: Mutex::new(Fetched::NoData("not scripted".to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            credentials_seen: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_usage(self, records: Vec<ModelUsageRecord>) -> Self {
        self.set_usage(Fetched::Data(records));
        self
    }

    /// Usage consisting of one record costing `cost_usd`.
    #[must_use]
    pub fn with_cost(self, cost_usd: f64) -> Self {
        self.set_cost(cost_usd);
        self
    }

    #[must_use]
    pub fn with_rate_limit(self, state: RateLimitState) -> Self {
        self.set_rate_limit(Fetched::Data(state));
        self
    }

    /// Every fetch reports no data.
    #[must_use]
    pub fn failing(self) -> Self {
        self.set_usage(Fetched::NoData("HTTP 500".to_string()));
        self.set_rate_limit(Fetched::NoData("HTTP 500".to_string()));
        self
    }

    /// Sleep this long (tokio time) before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_usage(&self, usage: Fetched<Vec<ModelUsageRecord>>) {
        *self.usage.lock().unwrap() = usage;
    }

    pub fn set_cost(&self, cost_usd: f64) {
        self.set_usage(Fetched::Data(vec![make_test_record("test-model", cost_usd)]));
    }

    pub fn set_rate_limit(&self, state: Fetched<RateLimitState>) {
        *self.rate_limit.lock().unwrap() = state;
    }

    /// Number of usage fetches started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Credentials passed to usage fetches, in call order.
    pub fn credentials_seen(&self) -> Vec<String> {
        self.credentials_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_usage(&self, credential: &str, _date: NaiveDate) -> Fetched<Vec<ModelUsageRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials_seen.lock().unwrap().push(credential.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.usage.lock().unwrap().clone()
    }

    async fn fetch_rate_limit(&self, _credential: &str) -> Fetched<RateLimitState> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.rate_limit.lock().unwrap().clone()
    }
}

// =============================================================================
// Credential Store and Sink
// =============================================================================

/// In-memory credential store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    entries: Arc<Mutex<HashMap<Provider, String>>>,
}

impl MemoryCredentials {
    #[must_use]
    pub fn with(entries: &[(Provider, &str)]) -> Self {
        let store = Self::default();
        for (provider, value) in entries {
            store
                .entries
                .lock()
                .unwrap()
                .insert(*provider, (*value).to_string());
        }
        store
    }
}

impl CredentialStore for MemoryCredentials {
    fn get(&self, provider: Provider) -> Option<String> {
        self.entries.lock().unwrap().get(&provider).cloned()
    }

    fn save(&self, provider: Provider, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(provider, value.to_string());
        Ok(())
    }

    fn delete(&self, provider: Provider) -> Result<()> {
        self.entries.lock().unwrap().remove(&provider);
        Ok(())
    }
}

/// Records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    /// `(title, body)` pairs in delivery order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|(title, _)| title).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

// =============================================================================
// Temp Directory Utilities
// =============================================================================

/// A temporary directory deleted on drop.
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Write a file, creating parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write test file");
        path
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip ANSI escape codes from a string.
#[must_use]
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_credentials_clones_share_entries() {
        let a = MemoryCredentials::with(&[(Provider::OpenAI, "sk-1")]);
        let b = a.clone();
        b.delete(Provider::OpenAI).unwrap();
        assert_eq!(a.get(Provider::OpenAI), None);
    }

    #[tokio::test]
    async fn fake_adapter_counts_calls() {
        let fake = FakeAdapter::new(Provider::Anthropic).with_cost(1.5);
        let date = Utc::now().date_naive();
        let usage = fake.fetch_usage("k", date).await.data().unwrap();
        assert!((usage[0].cost_usd - 1.5).abs() < 1e-9);
        assert_eq!(fake.calls(), 1);
        assert_eq!(fake.credentials_seen(), vec!["k".to_string()]);
    }

    #[test]
    fn strips_ansi() {
        assert_eq!(strip_ansi_codes("\x1b[1;33mAlert\x1b[0m"), "Alert");
    }
}
