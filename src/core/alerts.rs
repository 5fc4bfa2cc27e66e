//! Alert events and de-duplication.
//!
//! The evaluator in [`crate::core::budgets`] produces candidate [`AlertEvent`]s
//! every poll cycle. [`AlertCooldownState`] decides which of them actually
//! reach the notification sink:
//!
//! - budget alerts are suppressed while a previous budget alert is inside the
//!   cooldown window (5 minutes by default), regardless of how the spend moved;
//! - rate-limit alerts have no time-based cooldown but fire at most once per
//!   provider per poll cycle.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::provider::Provider;
use crate::util::{format_cost, format_percent};

/// Default minimum gap between two budget alerts.
pub const DEFAULT_BUDGET_COOLDOWN_MINUTES: u64 = 5;

/// Default rate-limit usage ratio at which an alert is raised.
pub const DEFAULT_RATE_LIMIT_THRESHOLD: f64 = 0.9;

// =============================================================================
// Settings
// =============================================================================

/// Alerting knobs (`[alerts]` section of the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Minimum minutes between two budget alerts.
    pub budget_cooldown_minutes: u64,
    /// Request-quota usage ratio (0..=1) that triggers a rate-limit alert.
    pub rate_limit_threshold: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            budget_cooldown_minutes: DEFAULT_BUDGET_COOLDOWN_MINUTES,
            rate_limit_threshold: DEFAULT_RATE_LIMIT_THRESHOLD,
        }
    }
}

impl AlertSettings {
    /// Budget cooldown as a chrono delta.
    #[must_use]
    pub fn budget_cooldown(&self) -> TimeDelta {
        i64::try_from(self.budget_cooldown_minutes)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .unwrap_or(TimeDelta::MAX)
    }
}

// =============================================================================
// Events
// =============================================================================

/// Kind of alert, used for cooldown bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertCategory {
    Budget,
    RateLimit(Provider),
}

/// A candidate notification produced by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertEvent {
    /// Today's spend crossed the alert threshold.
    Budget {
        today_total: f64,
        daily_budget: f64,
        /// Highest-spending provider and its spend, if any provider reported.
        top_provider: Option<Provider>,
        top_spend: f64,
    },
    /// A provider's request quota is nearly exhausted.
    RateLimit {
        provider: Provider,
        remaining: u64,
        /// Pre-formatted time until the quota resets (`"12 min"`, `"< 1 min"`).
        reset_window: String,
    },
}

impl AlertEvent {
    #[must_use]
    pub const fn category(&self) -> AlertCategory {
        match self {
            Self::Budget { .. } => AlertCategory::Budget,
            Self::RateLimit { provider, .. } => AlertCategory::RateLimit(*provider),
        }
    }

    /// Notification title.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Budget { .. } => "TokenMeter: Budget Alert",
            Self::RateLimit { .. } => "TokenMeter: Rate Limit",
        }
    }

    /// Notification body.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Budget {
                today_total,
                daily_budget,
                top_provider,
                top_spend,
            } => {
                let mut body = format!(
                    "Daily spend: {} / {}",
                    format_cost(*today_total),
                    format_cost(*daily_budget)
                );
                if *daily_budget > 0.0 {
                    let _ = write!(body, " ({})", format_percent(today_total / daily_budget));
                }
                if let Some(provider) = top_provider {
                    let _ = write!(body, "\nTop: {provider} ({})", format_cost(*top_spend));
                }
                body
            }
            Self::RateLimit {
                provider,
                remaining,
                reset_window,
            } => format!("{provider}: ~{remaining} requests left. Resets in {reset_window}."),
        }
    }
}

// =============================================================================
// Cooldown State
// =============================================================================

/// Remembers when alerts last fired. Lives for the process lifetime.
#[derive(Debug, Clone)]
pub struct AlertCooldownState {
    budget_cooldown: TimeDelta,
    last_budget_alert: Option<DateTime<Utc>>,
    /// Poll cycle in which each provider's rate-limit alert last fired.
    last_rate_limit_cycle: HashMap<Provider, u64>,
}

impl Default for AlertCooldownState {
    fn default() -> Self {
        Self::new(AlertSettings::default().budget_cooldown())
    }
}

impl AlertCooldownState {
    #[must_use]
    pub fn new(budget_cooldown: TimeDelta) -> Self {
        Self {
            budget_cooldown,
            last_budget_alert: None,
            last_rate_limit_cycle: HashMap::new(),
        }
    }

    /// Change the budget cooldown; recorded firings are kept.
    pub fn set_budget_cooldown(&mut self, cooldown: TimeDelta) {
        self.budget_cooldown = cooldown;
    }

    #[must_use]
    pub const fn last_budget_alert(&self) -> Option<DateTime<Utc>> {
        self.last_budget_alert
    }

    /// Decide whether `event` may fire now, recording the firing if so.
    pub fn should_fire(&mut self, event: &AlertEvent, cycle: u64, now: DateTime<Utc>) -> bool {
        match event.category() {
            AlertCategory::Budget => {
                if let Some(last) = self.last_budget_alert
                    && now - last < self.budget_cooldown
                {
                    tracing::debug!(
                        since_last_secs = (now - last).num_seconds(),
                        "Budget alert suppressed by cooldown"
                    );
                    return false;
                }
                self.last_budget_alert = Some(now);
                true
            }
            AlertCategory::RateLimit(provider) => {
                if self.last_rate_limit_cycle.get(&provider) == Some(&cycle) {
                    tracing::debug!(
                        provider = provider.cli_name(),
                        cycle,
                        "Rate-limit alert already fired this cycle"
                    );
                    return false;
                }
                self.last_rate_limit_cycle.insert(provider, cycle);
                true
            }
        }
    }

    /// Keep only the events allowed to fire, in their original order.
    pub fn filter(
        &mut self,
        events: Vec<AlertEvent>,
        cycle: u64,
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        events
            .into_iter()
            .filter(|event| self.should_fire(event, cycle, now))
            .collect()
    }
}
