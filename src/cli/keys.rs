//! `tokenmeter key`: manage API keys in the OS keyring.

use std::fmt::Write as _;
use std::io::{BufRead, IsTerminal};

use serde::Serialize;

use crate::cli::args::{KeyCommand, OutputFormat};
use crate::cli::once::alert_sink;
use crate::cli::{OutputOptions, build_aggregator};
use crate::core::credentials::{CredentialStore, KeyringStore};
use crate::core::provider::Provider;
use crate::error::{Result, TokenMeterError};
use crate::storage::config::ResolvedConfig;

/// Key state for one provider, as shown by `key status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub provider: Provider,
    pub configured: bool,
    pub usage_api: bool,
    pub rate_limit_probe: bool,
}

/// Execute a key subcommand.
///
/// # Errors
/// Returns an error if the keyring rejects the operation or no key value
/// was supplied.
pub async fn execute(cmd: KeyCommand, resolved: &ResolvedConfig, out: OutputOptions) -> Result<()> {
    match cmd {
        KeyCommand::Set { provider, value } => {
            let value = match value {
                Some(value) => value,
                None => read_key_from_stdin(provider)?,
            };
            let value = value.trim();
            if value.is_empty() {
                return Err(TokenMeterError::Config(format!(
                    "empty key for {}",
                    provider.display_name()
                )));
            }

            let aggregator = build_aggregator(resolved, alert_sink(out))?;
            let report = aggregator.save_credential(provider, value).await?;
            println!("Saved key for {}.", provider.display_name());
            if !provider.has_usage_api() {
                println!("{} has no usage API; spend will show as $0.00.", provider.display_name());
            } else if report.providers_updated.contains(&provider) {
                println!("Verified: usage fetched successfully.");
            } else {
                println!("Warning: no usage data returned. Check the key and try `tokenmeter once -v`.");
            }
            Ok(())
        }
        KeyCommand::Delete { provider } => {
            KeyringStore.delete(provider)?;
            println!("Removed key for {}.", provider.display_name());
            Ok(())
        }
        KeyCommand::Status => {
            let statuses = key_statuses(&KeyringStore);
            match out.format {
                OutputFormat::Json => {
                    let json = if out.pretty {
                        serde_json::to_string_pretty(&statuses)?
                    } else {
                        serde_json::to_string(&statuses)?
                    };
                    println!("{json}");
                }
                OutputFormat::Human => print!("{}", render_statuses(&statuses)),
            }
            Ok(())
        }
    }
}

/// Key state for every provider, in display order.
pub fn key_statuses(store: &dyn CredentialStore) -> Vec<KeyStatus> {
    Provider::ALL
        .iter()
        .map(|&provider| KeyStatus {
            provider,
            configured: store.contains(provider),
            usage_api: provider.has_usage_api(),
            rate_limit_probe: provider.has_rate_limit_probe(),
        })
        .collect()
}

fn render_statuses(statuses: &[KeyStatus]) -> String {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let mut out = format!("{:<12} {:<8} {:<10} {}\n", "Provider", "Key", "Usage API", "Rate limits");
    for status in statuses {
        let _ = writeln!(
            out,
            "{:<12} {:<8} {:<10} {}",
            status.provider.display_name(),
            if status.configured { "set" } else { "-" },
            yes_no(status.usage_api),
            yes_no(status.rate_limit_probe),
        );
    }
    out
}

fn read_key_from_stdin(provider: Provider) -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("Enter {} API key:", provider.display_name());
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}
