//! Budget configuration and threshold evaluation.
//!
//! The evaluator is a pure function of the current snapshots and settings. It
//! returns candidate [`AlertEvent`]s; whether they fire is decided by
//! [`AlertCooldownState`](super::alerts::AlertCooldownState).
//!
//! ## TOML Configuration Format
//!
//! ```toml
//! [budget]
//! daily_usd = 10.0
//! alert_threshold = 0.8
//! poll_interval_minutes = 5
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alerts::{AlertEvent, AlertSettings};
use super::models::ProviderUsageSnapshot;
use super::provider::Provider;
use crate::error::{Result, TokenMeterError};
use crate::util::format_reset_window;

pub const DEFAULT_DAILY_BUDGET_USD: f64 = 10.0;
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 5;

// =============================================================================
// Budget Configuration
// =============================================================================

/// Daily budget, alert threshold and poll interval.
///
/// Mutable at runtime; changes apply on the next poll or evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Daily budget in USD.
    pub daily_usd: f64,
    /// Budget usage fraction (0..=1) at which a budget alert is raised.
    pub alert_threshold: f64,
    /// Minutes between poll cycles.
    pub poll_interval_minutes: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_usd: DEFAULT_DAILY_BUDGET_USD,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            poll_interval_minutes: DEFAULT_POLL_INTERVAL_MINUTES,
        }
    }
}

impl BudgetConfig {
    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if !self.daily_usd.is_finite() || self.daily_usd < 0.0 {
            return Err(invalid("budget.daily_usd", self.daily_usd, "must be a non-negative amount"));
        }
        if !(0.0..=1.0).contains(&self.alert_threshold) {
            return Err(invalid(
                "budget.alert_threshold",
                self.alert_threshold,
                "must be between 0 and 1",
            ));
        }
        if self.poll_interval_minutes < 1 {
            return Err(invalid(
                "budget.poll_interval_minutes",
                self.poll_interval_minutes,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl std::fmt::Display, message: &str) -> TokenMeterError {
    TokenMeterError::ConfigInvalid {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

// =============================================================================
// Ratios
// =============================================================================

/// Sum of every provider's cost for the current period.
pub fn today_total<'a>(snapshots: impl IntoIterator<Item = &'a ProviderUsageSnapshot>) -> f64 {
    snapshots.into_iter().map(|s| s.total_cost_usd).sum()
}

/// `total / budget`, or 0 when the budget is not positive. Not capped at 1.
#[must_use]
pub fn budget_usage(total: f64, daily_budget: f64) -> f64 {
    if daily_budget <= 0.0 {
        0.0
    } else {
        total / daily_budget
    }
}

/// Budget left for today, never negative.
#[must_use]
pub fn budget_remaining(total: f64, daily_budget: f64) -> f64 {
    (daily_budget - total).max(0.0)
}

/// Coarse budget state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    Warning,
    Exceeded,
}

impl BudgetStatus {
    #[must_use]
    pub fn from_usage(usage: f64, alert_threshold: f64) -> Self {
        if usage >= 1.0 {
            Self::Exceeded
        } else if usage >= alert_threshold {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Exceeded => "exceeded",
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Compute candidate alerts for one poll cycle.
///
/// `snapshots` must be in display order; the first provider wins a tie for
/// top spender.
pub fn evaluate<'a>(
    snapshots: impl IntoIterator<Item = &'a ProviderUsageSnapshot>,
    budget: &BudgetConfig,
    alerts: &AlertSettings,
    now: DateTime<Utc>,
) -> Vec<AlertEvent> {
    let snapshots: Vec<&ProviderUsageSnapshot> = snapshots.into_iter().collect();
    let mut events = Vec::new();

    let total = today_total(snapshots.iter().copied());
    let usage = budget_usage(total, budget.daily_usd);
    if usage >= budget.alert_threshold {
        let top = top_spender(&snapshots);
        tracing::debug!(total, usage, threshold = budget.alert_threshold, "Budget threshold reached");
        events.push(AlertEvent::Budget {
            today_total: total,
            daily_budget: budget.daily_usd,
            top_provider: top.map(|(provider, _)| provider),
            top_spend: top.map_or(0.0, |(_, spend)| spend),
        });
    }

    for snapshot in &snapshots {
        let Some(limits) = &snapshot.rate_limit else {
            continue;
        };
        let (Some(ratio), Some(remaining)) = (limits.usage_ratio(), limits.requests_remaining)
        else {
            continue;
        };
        if ratio >= alerts.rate_limit_threshold {
            events.push(AlertEvent::RateLimit {
                provider: snapshot.provider,
                remaining,
                reset_window: format_reset_window(limits.resets_at, now),
            });
        }
    }

    events
}

fn top_spender(snapshots: &[&ProviderUsageSnapshot]) -> Option<(Provider, f64)> {
    let mut top: Option<(Provider, f64)> = None;
    for snapshot in snapshots {
        match top {
            Some((_, spend)) if snapshot.total_cost_usd <= spend => {}
            _ => top = Some((snapshot.provider, snapshot.total_cost_usd)),
        }
    }
    top
}
