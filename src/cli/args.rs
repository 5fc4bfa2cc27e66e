//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::provider::Provider;

/// TokenMeter - track AI API spend against a daily budget.
#[derive(Parser, Debug)]
#[command(name = "tokenmeter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll continuously and alert on thresholds (Ctrl+C to stop)
    Watch(WatchArgs),

    /// Poll once and print today's spend (default command)
    Once,

    /// Manage provider API keys
    #[command(subcommand)]
    Key(KeyCommand),

    /// Inspect or create the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug, Default)]
pub struct WatchArgs {
    /// Minutes between polls (overrides config)
    #[arg(long, value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

/// API key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Store a key in the OS keyring
    Set {
        /// Provider (anthropic, openai, google, xai)
        #[arg(value_parser = parse_provider)]
        provider: Provider,

        /// Key value; read from stdin when omitted
        value: Option<String>,
    },

    /// Remove a stored key
    Delete {
        #[arg(value_parser = parse_provider)]
        provider: Provider,
    },

    /// Show which providers have a key configured
    Status,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}

fn parse_provider(value: &str) -> Result<Provider, String> {
    Provider::from_cli_name(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_set_accepts_aliases() {
        let cli = Cli::try_parse_from(["tokenmeter", "key", "set", "claude", "sk-ant-1"]).unwrap();
        match cli.command {
            Some(Commands::Key(KeyCommand::Set { provider, value })) => {
                assert_eq!(provider, Provider::Anthropic);
                assert_eq!(value.as_deref(), Some("sk-ant-1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["tokenmeter", "key", "delete", "mistral"]).is_err());
    }

    #[test]
    fn watch_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["tokenmeter", "watch", "--interval", "0"]).is_err());
        let cli = Cli::try_parse_from(["tokenmeter", "watch", "--interval", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Watch(WatchArgs { interval: Some(2) }))
        ));
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["tokenmeter", "once", "--json"]).unwrap();
        assert_eq!(cli.effective_format(), OutputFormat::Json);
    }
}
