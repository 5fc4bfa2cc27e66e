//! Usage aggregation, cost estimation and alerting.

pub mod alerts;
pub mod budgets;
pub mod credentials;
pub mod history;
pub mod http;
pub mod logging;
pub mod models;
pub mod notify;
pub mod pricing;
pub mod provider;
pub mod scheduler;

pub use alerts::{AlertCategory, AlertCooldownState, AlertEvent, AlertSettings};
pub use budgets::{BudgetConfig, BudgetStatus, budget_remaining, budget_usage, evaluate, today_total};
pub use credentials::{CredentialStore, KeyringStore};
pub use history::SpendHistory;
pub use models::{Fetched, ModelUsageRecord, ProviderUsageSnapshot, RateLimitState};
pub use notify::{NotificationSink, TerminalSink, TracingSink};
pub use pricing::{CostFormula, PriceRule, PriceTable, VendorPrices, estimate_cost};
pub use provider::Provider;
pub use scheduler::{AggregateView, Aggregator, AggregatorBuilder, CycleReport};
