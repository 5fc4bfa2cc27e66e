//! `tokenmeter config`: inspect or create the config file.

use std::fmt::Write as _;

use crate::cli::args::{ConfigCommand, OutputFormat};
use crate::error::{Result, TokenMeterError};
use crate::storage::config::{CliOverrides, Config, ResolvedConfig};

/// Execute a config subcommand.
///
/// # Errors
/// Returns an error if the config is invalid, the file already exists on
/// `init` without `--force`, or writing fails.
pub fn execute(
    cmd: &ConfigCommand,
    overrides: &CliOverrides,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    match cmd {
        ConfigCommand::Path => {
            println!("{}", Config::config_path().display());
            Ok(())
        }
        ConfigCommand::Show => {
            let resolved = ResolvedConfig::resolve(overrides)?;
            match format {
                OutputFormat::Json => {
                    let json = if pretty {
                        serde_json::to_string_pretty(&resolved)?
                    } else {
                        serde_json::to_string(&resolved)?
                    };
                    println!("{json}");
                }
                OutputFormat::Human => print!("{}", render_resolved(&resolved)),
            }
            Ok(())
        }
        ConfigCommand::Init { force } => {
            let path = Config::config_path();
            if path.exists() && !force {
                return Err(TokenMeterError::Config(format!(
                    "config file already exists at {} (use --force to overwrite)",
                    path.display()
                )));
            }
            Config::default().save_to(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn render_resolved(resolved: &ResolvedConfig) -> String {
    let config = &resolved.config;
    let sources = &resolved.sources;
    let mut out = String::new();

    let found = if resolved.file_found { "" } else { " (not found, using defaults)" };
    let _ = writeln!(out, "Config file: {}{found}", resolved.path.display());
    let _ = writeln!(out);
    let rows = [
        ("budget.daily_usd", format!("{:.2}", config.budget.daily_usd), sources.daily_usd),
        (
            "budget.alert_threshold",
            config.budget.alert_threshold.to_string(),
            sources.alert_threshold,
        ),
        (
            "budget.poll_interval_minutes",
            config.budget.poll_interval_minutes.to_string(),
            sources.poll_interval_minutes,
        ),
        (
            "http.timeout_seconds",
            config.http.timeout_seconds.to_string(),
            sources.timeout_seconds,
        ),
        ("output.color", config.output.color.to_string(), sources.color),
    ];
    for (key, value, source) in rows {
        let _ = writeln!(out, "{key:<30} {value:<10} ({source})");
    }
    let _ = writeln!(
        out,
        "{:<30} {}",
        "alerts.budget_cooldown_minutes", config.alerts.budget_cooldown_minutes
    );
    let _ = writeln!(
        out,
        "{:<30} {}",
        "alerts.rate_limit_threshold", config.alerts.rate_limit_threshold
    );
    out
}
