//! `tokenmeter watch`: continuous polling.
//!
//! The aggregator owns the timer; this loop only waits for cycle reports
//! and redraws after each one until Ctrl+C.

use chrono::{DateTime, Utc};

use crate::cli::OutputOptions;
use crate::cli::build_aggregator;
use crate::cli::once::alert_sink;
use crate::cli::render::print_view;
use crate::core::scheduler::CycleReport;
use crate::error::Result;
use crate::storage::config::ResolvedConfig;

/// State tracking across watch iterations.
#[derive(Debug, Default)]
pub struct WatchState {
    pub cycles: u64,
    pub alerts_fired: u64,
    /// Cycles in which at least one polled provider returned no data.
    pub degraded_cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl WatchState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.alerts_fired += report.alerts_fired.len() as u64;
        if report.providers_updated.len() < report.providers_polled.len() {
            self.degraded_cycles += 1;
        }
        self.last_cycle_at = Some(report.finished_at);
    }

    /// One-line footer for human output.
    #[must_use]
    pub fn footer(&self) -> String {
        format!(
            "cycle {} | {} alert(s) | {} degraded",
            self.cycles, self.alerts_fired, self.degraded_cycles
        )
    }
}

/// Run watch mode until interrupted.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built or rendering fails.
pub async fn execute(resolved: &ResolvedConfig, out: OutputOptions) -> Result<()> {
    let aggregator = build_aggregator(resolved, alert_sink(out))?;
    let mut reports = aggregator.subscribe();
    let mut state = WatchState::new();

    let minutes = resolved.config.budget.poll_interval_minutes;
    tracing::info!(minutes, "Starting watch");
    aggregator.start_polling(minutes).await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = reports.borrow_and_update().clone();
                let Some(report) = report else { continue };
                state.update(&report);
                print_view(&aggregator.view().await, out.format, out.pretty, out.color)?;
                if out.format == crate::cli::OutputFormat::Human {
                    println!("{}\n", state.footer());
                }
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    aggregator.stop_polling().await;
    tracing::info!(cycles = state.cycles, "Watch stopped");
    Ok(())
}
