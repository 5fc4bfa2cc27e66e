//! `tokenmeter once`: a single poll cycle, then print.

use std::sync::Arc;

use crate::cli::render::print_view;
use crate::cli::{OutputOptions, build_aggregator};
use crate::core::notify::{NotificationSink, TerminalSink, TracingSink};
use crate::error::Result;
use crate::storage::config::ResolvedConfig;

/// Poll every configured provider once and print the aggregate.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built or rendering fails.
pub async fn execute(resolved: &ResolvedConfig, out: OutputOptions) -> Result<()> {
    let aggregator = build_aggregator(resolved, alert_sink(out))?;
    let report = aggregator.poll_once().await;
    tracing::info!(
        polled = report.providers_polled.len(),
        updated = report.providers_updated.len(),
        alerts = report.alerts_fired.len(),
        "Poll complete"
    );
    print_view(&aggregator.view().await, out.format, out.pretty, out.color)
}

/// Alerts go to the terminal in human mode and to the log otherwise, so
/// JSON on stdout stays clean.
pub(crate) fn alert_sink(out: OutputOptions) -> Arc<dyn NotificationSink> {
    match out.format {
        crate::cli::OutputFormat::Human => Arc::new(TerminalSink::new(out.color)),
        crate::cli::OutputFormat::Json => Arc::new(TracingSink),
    }
}
