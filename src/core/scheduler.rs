//! Aggregation scheduler.
//!
//! [`Aggregator`] owns the snapshot map, the spend history and the alert
//! cooldown state. Readers go through accessor methods that hand out clones.
//!
//! A poll cycle:
//! 1. spawns one task per provider that has a credential (usage and rate limit
//!    fetched together, capped by the provider's fetch budget);
//! 2. merges each provider's result as soon as its task settles, on the
//!    cycle's own task, so merges never race;
//! 3. once every task has settled, stamps `last_updated`, records today's
//!    total, evaluates budgets once, and sends de-duplicated alerts.
//!
//! Cycles are serialized. The recurring timer spawns each cycle as its own
//! task, so replacing or stopping the timer never cancels a cycle in flight.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::alerts::{AlertCooldownState, AlertEvent, AlertSettings};
use super::budgets::{
    BudgetConfig, BudgetStatus, budget_remaining, budget_usage, evaluate, today_total,
};
use super::credentials::CredentialStore;
use super::history::SpendHistory;
use super::http::DEFAULT_TIMEOUT;
use super::models::{Fetched, ModelUsageRecord, ProviderUsageSnapshot, RateLimitState};
use super::notify::NotificationSink;
use super::provider::Provider;
use crate::error::Result;
use crate::providers::UsageAdapter;

// =============================================================================
// Reports and Views
// =============================================================================

/// Summary of one completed poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Providers that had a credential and were fetched.
    pub providers_polled: Vec<Provider>,
    /// Providers whose snapshot was replaced.
    pub providers_updated: Vec<Provider>,
    /// Alerts that passed de-duplication and were sent.
    pub alerts_fired: Vec<AlertEvent>,
    pub finished_at: DateTime<Utc>,
}

/// Read-only copy of the aggregate state with derived budget figures.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateView {
    /// Snapshots in display order.
    pub snapshots: Vec<ProviderUsageSnapshot>,
    pub last_updated: Option<DateTime<Utc>>,
    pub today_total: f64,
    pub daily_budget: f64,
    pub budget_usage: f64,
    pub budget_remaining: f64,
    pub budget_status: BudgetStatus,
    pub weekly_total: f64,
    pub monthly_pace: f64,
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Default)]
struct AggregateState {
    snapshots: BTreeMap<Provider, ProviderUsageSnapshot>,
    last_updated: Option<DateTime<Utc>>,
    history: SpendHistory,
}

#[derive(Debug, Clone, Default)]
struct Settings {
    budget: BudgetConfig,
    alerts: AlertSettings,
}

struct Shared {
    adapters: Vec<Arc<dyn UsageAdapter>>,
    credentials: Arc<dyn CredentialStore>,
    sink: Arc<dyn NotificationSink>,
    settings: RwLock<Settings>,
    state: RwLock<AggregateState>,
    cooldown: Mutex<AlertCooldownState>,
    cycle_lock: Mutex<()>,
    cycles: AtomicU64,
    fetch_timeout: Duration,
    history_path: Option<PathBuf>,
    reports: watch::Sender<Option<CycleReport>>,
}

struct PollTimer {
    period: Duration,
    handle: JoinHandle<()>,
}

// =============================================================================
// Builder
// =============================================================================

/// Configures an [`Aggregator`].
pub struct AggregatorBuilder {
    adapters: Vec<Arc<dyn UsageAdapter>>,
    credentials: Arc<dyn CredentialStore>,
    sink: Arc<dyn NotificationSink>,
    settings: Settings,
    fetch_timeout: Duration,
    history: SpendHistory,
    history_path: Option<PathBuf>,
}

impl AggregatorBuilder {
    #[must_use]
    pub fn budget(mut self, budget: BudgetConfig) -> Self {
        self.settings.budget = budget;
        self
    }

    #[must_use]
    pub fn alerts(mut self, alerts: AlertSettings) -> Self {
        self.settings.alerts = alerts;
        self
    }

    /// Per-request HTTP timeout the adapters were built with.
    #[must_use]
    pub const fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Seed the spend history.
    #[must_use]
    pub fn history(mut self, history: SpendHistory) -> Self {
        self.history = history;
        self
    }

    /// Persist the spend history here after every cycle.
    #[must_use]
    pub fn history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Aggregator {
        let cooldown = AlertCooldownState::new(self.settings.alerts.budget_cooldown());
        let (reports, _) = watch::channel(None);
        Aggregator {
            shared: Arc::new(Shared {
                adapters: self.adapters,
                credentials: self.credentials,
                sink: self.sink,
                settings: RwLock::new(self.settings),
                state: RwLock::new(AggregateState {
                    history: self.history,
                    ..AggregateState::default()
                }),
                cooldown: Mutex::new(cooldown),
                cycle_lock: Mutex::new(()),
                cycles: AtomicU64::new(0),
                fetch_timeout: self.fetch_timeout,
                history_path: self.history_path,
                reports,
            }),
            timer: Mutex::new(None),
        }
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Polls every configured provider and keeps the aggregate state.
pub struct Aggregator {
    shared: Arc<Shared>,
    timer: Mutex<Option<PollTimer>>,
}

impl Aggregator {
    #[must_use]
    pub fn builder(
        adapters: Vec<Arc<dyn UsageAdapter>>,
        credentials: Arc<dyn CredentialStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> AggregatorBuilder {
        AggregatorBuilder {
            adapters,
            credentials,
            sink,
            settings: Settings::default(),
            fetch_timeout: DEFAULT_TIMEOUT,
            history: SpendHistory::default(),
            history_path: None,
        }
    }

    /// Run one poll cycle now and wait for it to finish.
    ///
    /// If another cycle is running this waits for it, then runs its own.
    pub async fn poll_once(&self) -> CycleReport {
        poll_cycle(&self.shared).await
    }

    /// Poll now, then every `interval_minutes` (at least 1).
    pub async fn start_polling(&self, interval_minutes: u64) {
        let period = Duration::from_secs(interval_minutes.max(1).saturating_mul(60));
        self.start_polling_with_period(period).await;
    }

    /// Poll now, then every `period`. Replaces any running schedule.
    pub async fn start_polling_with_period(&self, period: Duration) {
        let mut timer = self.timer.lock().await;
        self.replace_timer(&mut timer, period);
    }

    /// Cancel the schedule. A cycle already running completes normally.
    pub async fn stop_polling(&self) {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.handle.abort();
            tracing::info!("Polling stopped");
        }
    }

    /// Whether a recurring schedule is active.
    pub async fn is_polling(&self) -> bool {
        self.timer.lock().await.is_some()
    }

    /// Period of the active schedule.
    pub async fn polling_period(&self) -> Option<Duration> {
        self.timer.lock().await.as_ref().map(|t| t.period)
    }

    fn replace_timer(&self, slot: &mut Option<PollTimer>, period: Duration) {
        if let Some(old) = slot.take() {
            old.handle.abort();
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    poll_cycle(&shared).await;
                });
            }
        });

        tracing::info!(period_secs = period.as_secs(), "Polling scheduled");
        *slot = Some(PollTimer { period, handle });
    }

    /// Current budget settings.
    pub async fn budget(&self) -> BudgetConfig {
        self.shared.settings.read().await.budget.clone()
    }

    /// Replace the budget settings.
    ///
    /// Takes effect at the next evaluation. If polling is active and the
    /// interval changed, the schedule is replaced (with an immediate poll).
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the settings are out of range.
    pub async fn set_budget(&self, budget: BudgetConfig) -> Result<()> {
        budget.validate()?;
        let period = budget.poll_interval();
        self.shared.settings.write().await.budget = budget;

        let mut timer = self.timer.lock().await;
        if timer.as_ref().is_some_and(|t| t.period != period) {
            self.replace_timer(&mut timer, period);
        }
        Ok(())
    }

    /// Replace the alert settings.
    pub async fn set_alert_settings(&self, alerts: AlertSettings) {
        self.shared
            .cooldown
            .lock()
            .await
            .set_budget_cooldown(alerts.budget_cooldown());
        self.shared.settings.write().await.alerts = alerts;
    }

    /// Store a credential and poll immediately.
    ///
    /// # Errors
    ///
    /// Returns error if the credential store rejects the write.
    pub async fn save_credential(&self, provider: Provider, value: &str) -> Result<CycleReport> {
        self.shared.credentials.save(provider, value)?;
        Ok(self.poll_once().await)
    }

    /// Remove a credential. The provider's last snapshot is kept.
    ///
    /// # Errors
    ///
    /// Returns error if the credential store rejects the delete.
    pub fn delete_credential(&self, provider: Provider) -> Result<()> {
        self.shared.credentials.delete(provider)
    }

    /// Latest snapshot for one provider.
    pub async fn snapshot(&self, provider: Provider) -> Option<ProviderUsageSnapshot> {
        self.shared.state.read().await.snapshots.get(&provider).cloned()
    }

    /// All snapshots in display order.
    pub async fn snapshots(&self) -> Vec<ProviderUsageSnapshot> {
        self.shared.state.read().await.snapshots.values().cloned().collect()
    }

    /// When the last cycle finished.
    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.shared.state.read().await.last_updated
    }

    /// Aggregate state plus derived budget figures.
    pub async fn view(&self) -> AggregateView {
        let budget = self.budget().await;
        let state = self.shared.state.read().await;
        let today = state
            .last_updated
            .unwrap_or_else(Utc::now)
            .date_naive();

        let total = today_total(state.snapshots.values().filter(|s| s.covers(today)));
        let usage = budget_usage(total, budget.daily_usd);
        AggregateView {
            snapshots: state.snapshots.values().cloned().collect(),
            last_updated: state.last_updated,
            today_total: total,
            daily_budget: budget.daily_usd,
            budget_usage: usage,
            budget_remaining: budget_remaining(total, budget.daily_usd),
            budget_status: BudgetStatus::from_usage(usage, budget.alert_threshold),
            weekly_total: state.history.weekly_total(today),
            monthly_pace: state.history.monthly_pace(today),
        }
    }

    /// Copy of the spend history.
    pub async fn history(&self) -> SpendHistory {
        self.shared.state.read().await.history.clone()
    }

    /// Receive a report after every completed cycle.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<CycleReport>> {
        self.shared.reports.subscribe()
    }

    /// Number of cycles started so far.
    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.handle.abort();
        }
    }
}

// =============================================================================
// Poll Cycle
// =============================================================================

type ProviderResult = (Fetched<Vec<ModelUsageRecord>>, Fetched<RateLimitState>);

async fn fetch_provider(
    adapter: Arc<dyn UsageAdapter>,
    credential: String,
    date: NaiveDate,
    budget: Duration,
) -> ProviderResult {
    let provider = adapter.provider();
    let started = Instant::now();
    let fetch = async {
        tokio::join!(
            adapter.fetch_usage(&credential, date),
            adapter.fetch_rate_limit(&credential)
        )
    };

    match tokio::time::timeout(budget, fetch).await {
        Ok(result) => {
            tracing::debug!(
                provider = provider.cli_name(),
                duration_ms = started.elapsed().as_millis(),
                usage = result.0.is_data(),
                rate_limit = result.1.is_data(),
                "Provider fetch settled"
            );
            result
        }
        Err(_) => {
            tracing::warn!(
                provider = provider.cli_name(),
                budget_secs = budget.as_secs(),
                "Provider fetch timed out"
            );
            let reason = format!("timed out after {}s", budget.as_secs());
            (Fetched::NoData(reason.clone()), Fetched::NoData(reason))
        }
    }
}

/// Upper bound for one provider's fetch within a poll cycle.
///
/// The usage and rate-limit requests each carry the HTTP client timeout;
/// this caps the pair so one stuck vendor cannot hold a cycle open forever.
#[must_use]
pub fn fetch_budget(request_timeout: Duration) -> Duration {
    request_timeout.saturating_mul(2) + Duration::from_secs(5)
}

async fn poll_cycle(shared: &Arc<Shared>) -> CycleReport {
    let _running = shared.cycle_lock.lock().await;
    let cycle = shared.cycles.fetch_add(1, Ordering::SeqCst) + 1;
    let started = Instant::now();
    let date = Utc::now().date_naive();
    tracing::debug!(cycle, %date, "Poll cycle started");

    let mut pending = FuturesUnordered::new();
    let mut polled = Vec::new();
    for adapter in &shared.adapters {
        let provider = adapter.provider();
        let Some(credential) = shared.credentials.get(provider) else {
            tracing::debug!(provider = provider.cli_name(), "No credential, skipping");
            continue;
        };
        polled.push(provider);

        let budget = fetch_budget(shared.fetch_timeout);
        let handle = tokio::spawn(fetch_provider(Arc::clone(adapter), credential, date, budget));
        pending.push(async move { (provider, handle.await) });
    }

    let mut updated = Vec::new();
    while let Some((provider, joined)) = pending.next().await {
        let (usage, rate_limit) = joined.unwrap_or_else(|err| {
            tracing::warn!(provider = provider.cli_name(), error = %err, "Fetch task failed");
            (
                Fetched::NoData("fetch task failed".to_string()),
                Fetched::NoData("fetch task failed".to_string()),
            )
        });

        let mut state = shared.state.write().await;
        let next = ProviderUsageSnapshot::supersede(
            state.snapshots.get(&provider),
            provider,
            usage,
            rate_limit,
            date,
            Utc::now(),
        );
        if let Some(next) = next {
            state.snapshots.insert(provider, next);
            updated.push(provider);
        }
    }

    let now = Utc::now();
    let settings = shared.settings.read().await.clone();
    let today = now.date_naive();
    let (events, history) = {
        let mut state = shared.state.write().await;
        state.last_updated = Some(now);
        let current: Vec<&ProviderUsageSnapshot> =
            state.snapshots.values().filter(|s| s.covers(today)).collect();
        let total = today_total(current.iter().copied());
        let events = evaluate(current, &settings.budget, &settings.alerts, now);
        state.history.record(today, total);
        (events, state.history.clone())
    };

    if let Some(path) = shared.history_path.clone() {
        let saved = tokio::task::spawn_blocking(move || history.save(&path).map_err(|e| (path, e)));
        match saved.await {
            Ok(Ok(())) => {}
            Ok(Err((path, err))) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to save spend history");
            }
            Err(err) => tracing::warn!(error = %err, "Spend history save task failed"),
        }
    }

    let fired = shared.cooldown.lock().await.filter(events, cycle, now);
    for event in &fired {
        shared.sink.send(event.title(), &event.body());
    }

    let report = CycleReport {
        cycle,
        providers_polled: polled,
        providers_updated: updated,
        alerts_fired: fired,
        finished_at: now,
    };
    tracing::info!(
        cycle,
        polled = report.providers_polled.len(),
        updated = report.providers_updated.len(),
        alerts = report.alerts_fired.len(),
        duration_ms = started.elapsed().as_millis(),
        "Poll cycle complete"
    );
    shared.reports.send_replace(Some(report.clone()));
    report
}
