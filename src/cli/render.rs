//! Output rendering for the aggregate view.

use std::fmt::Write as _;

use colored::Colorize;

use crate::cli::args::OutputFormat;
use crate::core::budgets::BudgetStatus;
use crate::core::scheduler::AggregateView;
use crate::error::Result;
use crate::util::format::{display_model_name, format_cost, format_percent, format_tokens};
use crate::util::time::format_reset_window;

/// Print the view in the requested format.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn print_view(view: &AggregateView, format: OutputFormat, pretty: bool, color: bool) -> Result<()> {
    match format {
        OutputFormat::Human => print!("{}", render_human(view, color)),
        OutputFormat::Json => println!("{}", render_json(view, pretty)?),
    }
    Ok(())
}

/// Serialize the view as JSON.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_json(view: &AggregateView, pretty: bool) -> Result<String> {
    let output = if pretty {
        serde_json::to_string_pretty(view)?
    } else {
        serde_json::to_string(view)?
    };
    Ok(output)
}

/// Render the view as a plain-text table.
#[must_use]
pub fn render_human(view: &AggregateView, color: bool) -> String {
    let now = chrono::Utc::now();
    let mut out = String::new();

    let headline = format!(
        "Today: {} / {} ({})",
        format_cost(view.today_total),
        format_cost(view.daily_budget),
        format_percent(view.budget_usage),
    );
    let headline = if color {
        match view.budget_status {
            BudgetStatus::Ok => headline.green().bold().to_string(),
            BudgetStatus::Warning => headline.yellow().bold().to_string(),
            BudgetStatus::Exceeded => headline.red().bold().to_string(),
        }
    } else {
        headline
    };
    let _ = writeln!(out, "{headline}");
    let _ = writeln!(
        out,
        "Remaining: {}   7-day: {}   30-day pace: {}",
        format_cost(view.budget_remaining),
        format_cost(view.weekly_total),
        format_cost(view.monthly_pace),
    );

    if view.snapshots.is_empty() {
        let _ = writeln!(out, "\nNo usage data yet. Add a key with `tokenmeter key set <provider>`.");
        return out;
    }

    for snapshot in &view.snapshots {
        let name = snapshot.provider.display_name();
        let name = if color { name.bold().to_string() } else { name.to_string() };
        let _ = writeln!(out, "\n{name}  {}", format_cost(snapshot.total_cost_usd));
        for record in &snapshot.models {
            let _ = writeln!(
                out,
                "  {:<32} {:>8} in {:>8} out {:>9}",
                display_model_name(&record.model),
                format_tokens(record.input_tokens),
                format_tokens(record.output_tokens),
                format_cost(record.cost_usd),
            );
        }
        if let Some(rate) = &snapshot.rate_limit {
            if let (Some(remaining), Some(limit)) = (rate.requests_remaining, rate.requests_limit) {
                let _ = writeln!(
                    out,
                    "  requests: {remaining}/{limit} left, resets in {}",
                    format_reset_window(rate.resets_at, now),
                );
            }
        }
    }

    if let Some(updated) = view.last_updated {
        let stamp = updated.format("%H:%M:%S UTC").to_string();
        let stamp = if color { stamp.dimmed().to_string() } else { stamp };
        let _ = writeln!(out, "\nUpdated {stamp}");
    }
    out
}
