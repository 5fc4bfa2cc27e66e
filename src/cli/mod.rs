//! CLI argument parsing and command dispatch.

pub mod args;
pub mod config;
pub mod keys;
pub mod once;
pub mod render;
pub mod watch;

use std::sync::Arc;

pub use args::{Cli, Commands, OutputFormat};

use crate::core::credentials::{CredentialStore, KeyringStore};
use crate::core::history::SpendHistory;
use crate::core::notify::NotificationSink;
use crate::core::scheduler::Aggregator;
use crate::error::Result;
use crate::providers::{AdapterContext, default_adapters};
use crate::storage::config::{CliOverrides, ResolvedConfig};
use crate::storage::paths::AppPaths;

/// Output options shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub color: bool,
}

/// Run the parsed command line.
///
/// # Errors
/// Propagates configuration, credential store and rendering failures.
pub async fn run(cli: Cli) -> Result<()> {
    let format = cli.effective_format();
    let interval = match &cli.command {
        Some(Commands::Watch(args)) => args.interval,
        _ => None,
    };
    let overrides = CliOverrides {
        poll_interval_minutes: interval,
        no_color: cli.no_color,
    };

    match cli.command {
        None | Some(Commands::Once) => {
            let resolved = ResolvedConfig::resolve(&overrides)?;
            let out = output_options(format, cli.pretty, &resolved);
            once::execute(&resolved, out).await
        }
        Some(Commands::Watch(_)) => {
            let resolved = ResolvedConfig::resolve(&overrides)?;
            let out = output_options(format, cli.pretty, &resolved);
            watch::execute(&resolved, out).await
        }
        Some(Commands::Key(cmd)) => {
            let resolved = ResolvedConfig::resolve(&overrides)?;
            let out = output_options(format, cli.pretty, &resolved);
            keys::execute(cmd, &resolved, out).await
        }
        Some(Commands::Config(cmd)) => config::execute(&cmd, &overrides, format, cli.pretty),
    }
}

const fn output_options(format: OutputFormat, pretty: bool, resolved: &ResolvedConfig) -> OutputOptions {
    OutputOptions {
        format,
        pretty,
        color: resolved.config.output.color,
    }
}

/// Wire the aggregator to the real adapters, the OS keyring and the
/// on-disk spend history.
pub(crate) fn build_aggregator(
    resolved: &ResolvedConfig,
    sink: Arc<dyn NotificationSink>,
) -> Result<Aggregator> {
    let config = &resolved.config;
    let ctx = AdapterContext::new(config.timeout())?;
    let credentials: Arc<dyn CredentialStore> = Arc::new(KeyringStore);

    let history_path = AppPaths::new().spend_history_file();
    let history = SpendHistory::load(&history_path).unwrap_or_else(|err| {
        tracing::warn!(path = %history_path.display(), error = %err, "Ignoring unreadable spend history");
        SpendHistory::default()
    });

    Ok(Aggregator::builder(default_adapters(&ctx), credentials, sink)
        .budget(config.budget.clone())
        .alerts(config.alerts.clone())
        .fetch_timeout(config.timeout())
        .history(history)
        .history_path(history_path)
        .build())
}
