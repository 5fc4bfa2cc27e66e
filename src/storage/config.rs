//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/tokenmeter/config.toml`
//! - macOS: `~/Library/Application Support/com.tokenmeter.tokenmeter/config.toml`
//! - Windows: `%APPDATA%/tokenmeter/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `TOKENMETER_CONFIG`: Override config file path
//! - `TOKENMETER_DAILY_BUDGET`: Daily budget in USD
//! - `TOKENMETER_ALERT_THRESHOLD`: Budget alert threshold (0..=1)
//! - `TOKENMETER_POLL_INTERVAL`: Poll interval in minutes
//! - `TOKENMETER_TIMEOUT`: HTTP request timeout in seconds
//! - `NO_COLOR`: Disable colors

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::core::alerts::AlertSettings;
use crate::core::budgets::BudgetConfig;
use crate::error::{Result, TokenMeterError};

// =============================================================================
// Environment Variable Names
// =============================================================================

pub const ENV_CONFIG: &str = "TOKENMETER_CONFIG";
pub const ENV_DAILY_BUDGET: &str = "TOKENMETER_DAILY_BUDGET";
pub const ENV_ALERT_THRESHOLD: &str = "TOKENMETER_ALERT_THRESHOLD";
pub const ENV_POLL_INTERVAL: &str = "TOKENMETER_POLL_INTERVAL";
pub const ENV_TIMEOUT: &str = "TOKENMETER_TIMEOUT";
/// Standard environment variable to disable colors.
pub const ENV_NO_COLOR_STD: &str = "NO_COLOR";

/// Longest accepted HTTP timeout.
const MAX_TIMEOUT_SECONDS: u64 = 300;

// =============================================================================
// File Format
// =============================================================================

/// Application configuration, as stored in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub budget: BudgetConfig,
    pub alerts: AlertSettings,
    pub http: HttpConfig,
    pub output: OutputConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 20,
        }
    }
}

/// Output formatting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

impl Config {
    /// Load configuration from the resolved config file path.
    ///
    /// # Errors
    ///
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist. Values are not
    /// validated here; see [`Config::validate`].
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(read_config(path)?.map(|(config, _)| config).unwrap_or_default())
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns error on serialization or I/O failure.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TokenMeterError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Config file path: `TOKENMETER_CONFIG` if set, else the platform default.
    #[must_use]
    pub fn config_path() -> PathBuf {
        std::env::var(ENV_CONFIG)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| AppPaths::new().config_file(), PathBuf::from)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.budget.validate()?;

        let threshold = self.alerts.rate_limit_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "alerts.rate_limit_threshold",
                threshold,
                "must be between 0 and 1",
            ));
        }
        if self.alerts.budget_cooldown_minutes < 1 {
            return Err(invalid(
                "alerts.budget_cooldown_minutes",
                self.alerts.budget_cooldown_minutes,
                "must be at least 1",
            ));
        }
        if !(1..=MAX_TIMEOUT_SECONDS).contains(&self.http.timeout_seconds) {
            return Err(invalid(
                "http.timeout_seconds",
                self.http.timeout_seconds,
                "must be between 1 and 300 seconds",
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

/// Parse the file both as typed config and as a raw table (for key presence).
fn read_config(path: &Path) -> Result<Option<(Config, toml::Table)>> {
    if !path.exists() {
        tracing::debug!(?path, "Config file not found, using defaults");
        return Ok(None);
    }

    tracing::debug!(?path, "Loading config file");
    let content = fs::read_to_string(path)?;
    let parse_error = |e: toml::de::Error| TokenMeterError::Config(format!("Invalid config file: {e}"));
    let config: Config = toml::from_str(&content).map_err(parse_error)?;
    let table: toml::Table = toml::from_str(&content).map_err(parse_error)?;
    Ok(Some((config, table)))
}

fn table_has(table: Option<&toml::Table>, section: &str, key: &str) -> bool {
    table
        .and_then(|t| t.get(section))
        .and_then(|s| s.get(key))
        .is_some()
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Cli,
    Env,
    ConfigFile,
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Source of each overridable setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigSources {
    pub daily_usd: ConfigSource,
    pub alert_threshold: ConfigSource,
    pub poll_interval_minutes: ConfigSource,
    pub timeout_seconds: ConfigSource,
    pub color: ConfigSource,
}

/// Values the CLI can force.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub poll_interval_minutes: Option<u64>,
    pub no_color: bool,
}

/// Fully resolved, validated configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config: Config,
    /// File the configuration was read from (may not exist).
    pub path: PathBuf,
    pub file_found: bool,
    pub sources: ConfigSources,
}

impl ResolvedConfig {
    /// Resolve from the default config path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is invalid, an environment
    /// override cannot be parsed, or a resolved value is out of range.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        Self::resolve_from(&Config::config_path(), cli)
    }

    /// Resolve using a specific config file.
    ///
    /// # Errors
    ///
    /// Same as [`ResolvedConfig::resolve`].
    pub fn resolve_from(path: &Path, cli: &CliOverrides) -> Result<Self> {
        let loaded = read_config(path)?;
        let file_found = loaded.is_some();
        let (mut config, table) = loaded.map_or((Config::default(), None), |(c, t)| (c, Some(t)));
        let mut sources = ConfigSources::default();
        let file = |section: &str, key: &str| {
            if table_has(table.as_ref(), section, key) {
                ConfigSource::ConfigFile
            } else {
                ConfigSource::Default
            }
        };
        sources.daily_usd = file("budget", "daily_usd");
        sources.alert_threshold = file("budget", "alert_threshold");
        sources.poll_interval_minutes = file("budget", "poll_interval_minutes");
        sources.timeout_seconds = file("http", "timeout_seconds");
        sources.color = file("output", "color");

        if let Some(value) = env_override::<f64>(ENV_DAILY_BUDGET)? {
            config.budget.daily_usd = value;
            sources.daily_usd = ConfigSource::Env;
        }
        if let Some(value) = env_override::<f64>(ENV_ALERT_THRESHOLD)? {
            config.budget.alert_threshold = value;
            sources.alert_threshold = ConfigSource::Env;
        }
        if let Some(value) = env_override::<u64>(ENV_POLL_INTERVAL)? {
            config.budget.poll_interval_minutes = value;
            sources.poll_interval_minutes = ConfigSource::Env;
        }
        if let Some(value) = env_override::<u64>(ENV_TIMEOUT)? {
            config.http.timeout_seconds = value;
            sources.timeout_seconds = ConfigSource::Env;
        }
        if std::env::var_os(ENV_NO_COLOR_STD).is_some_and(|v| !v.is_empty()) {
            config.output.color = false;
            sources.color = ConfigSource::Env;
        }

        if let Some(minutes) = cli.poll_interval_minutes {
            config.budget.poll_interval_minutes = minutes;
            sources.poll_interval_minutes = ConfigSource::Cli;
        }
        if cli.no_color {
            config.output.color = false;
            sources.color = ConfigSource::Cli;
        }

        config.validate()?;
        Ok(Self {
            config,
            path: path.to_path_buf(),
            file_found,
            sources,
        })
    }
}

fn env_override<T: FromStr>(var: &str) -> Result<Option<T>> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| invalid(var, raw, "could not parse environment value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestDir, make_test_config_toml};

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Run `f` with the given variables set, restoring them afterwards.
    #[allow(unsafe_code)]
    fn with_env(vars: &[(&str, &str)], f: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let prior: Vec<_> = vars.iter().map(|(k, _)| (*k, std::env::var(k).ok())).collect();
        for (key, value) in vars {
            // SAFETY: env mutation is serialized by ENV_LOCK.
            unsafe { std::env::set_var(key, value) };
        }
        f();
        for (key, value) in prior {
            match value {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }

    fn clean_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_DAILY_BUDGET, ""),
            (ENV_ALERT_THRESHOLD, ""),
            (ENV_POLL_INTERVAL, ""),
            (ENV_TIMEOUT, ""),
            (ENV_NO_COLOR_STD, ""),
        ]
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(20));
        assert!((config.budget.daily_usd - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.alerts.budget_cooldown_minutes, 5);
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = TestDir::new();
        let config = Config::load_from(&dir.file_path("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_all_sections() {
        let dir = TestDir::new();
        let path = dir.create_file("config.toml", &make_test_config_toml());
        let config = Config::load_from(&path).unwrap();

        assert!((config.budget.daily_usd - 25.0).abs() < f64::EPSILON);
        assert!((config.budget.alert_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.budget.poll_interval_minutes, 10);
        assert_eq!(config.alerts.budget_cooldown_minutes, 15);
        assert_eq!(config.http.timeout_seconds, 12);
        assert!(!config.output.color);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let dir = TestDir::new();
        let path = dir.create_file("config.toml", "[budget]\ndaily_usd = 3.5\n");
        let config = Config::load_from(&path).unwrap();
        assert!((config.budget.daily_usd - 3.5).abs() < f64::EPSILON);
        assert!((config.budget.alert_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = TestDir::new();
        let path = dir.create_file("config.toml", "[budget\ndaily_usd = ");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, TokenMeterError::Config(_)));
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = TestDir::new();
        let path = dir.file_path("nested/config.toml");
        let mut config = Config::default();
        config.budget.daily_usd = 42.0;
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.http.timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.http.timeout_seconds = 301;
        assert!(config.validate().is_err());
        config.http.timeout_seconds = 300;
        assert!(config.validate().is_ok());

        config.alerts.rate_limit_threshold = 1.2;
        assert!(matches!(
            config.validate(),
            Err(TokenMeterError::ConfigInvalid { key, .. }) if key == "alerts.rate_limit_threshold"
        ));
        config.alerts.rate_limit_threshold = 0.9;
        config.alerts.budget_cooldown_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_tracks_sources() {
        let dir = TestDir::new();
        let path = dir.create_file("config.toml", "[budget]\ndaily_usd = 5.0\n");

        let mut vars = clean_env();
        vars.push((ENV_TIMEOUT, "15"));
        with_env(&vars, || {
            let cli = CliOverrides {
                poll_interval_minutes: Some(2),
                no_color: true,
            };
            let resolved = ResolvedConfig::resolve_from(&path, &cli).unwrap();

            assert!(resolved.file_found);
            assert_eq!(resolved.sources.daily_usd, ConfigSource::ConfigFile);
            assert_eq!(resolved.sources.alert_threshold, ConfigSource::Default);
            assert_eq!(resolved.sources.timeout_seconds, ConfigSource::Env);
            assert_eq!(resolved.sources.poll_interval_minutes, ConfigSource::Cli);
            assert_eq!(resolved.sources.color, ConfigSource::Cli);
            assert_eq!(resolved.config.http.timeout_seconds, 15);
            assert_eq!(resolved.config.budget.poll_interval_minutes, 2);
            assert!(!resolved.config.output.color);
        });
    }

    #[test]
    fn env_overrides_file() {
        let dir = TestDir::new();
        let path = dir.create_file("config.toml", &make_test_config_toml());

        let mut vars = clean_env();
        vars.push((ENV_DAILY_BUDGET, "7.5"));
        vars.push((ENV_ALERT_THRESHOLD, "0.5"));
        with_env(&vars, || {
            let resolved = ResolvedConfig::resolve_from(&path, &CliOverrides::default()).unwrap();
            assert!((resolved.config.budget.daily_usd - 7.5).abs() < f64::EPSILON);
            assert!((resolved.config.budget.alert_threshold - 0.5).abs() < f64::EPSILON);
            assert_eq!(resolved.sources.daily_usd, ConfigSource::Env);
        });
    }

    #[test]
    fn unparsable_env_value_is_rejected() {
        let dir = TestDir::new();
        let mut vars = clean_env();
        vars.push((ENV_POLL_INTERVAL, "soon"));
        with_env(&vars, || {
            let err = ResolvedConfig::resolve_from(&dir.file_path("none.toml"), &CliOverrides::default())
                .unwrap_err();
            assert!(matches!(err, TokenMeterError::ConfigInvalid { key, .. } if key == ENV_POLL_INTERVAL));
        });
    }

    #[test]
    fn resolved_values_are_validated() {
        let dir = TestDir::new();
        let cli = CliOverrides {
            poll_interval_minutes: Some(0),
            no_color: false,
        };
        with_env(&clean_env(), || {
            assert!(ResolvedConfig::resolve_from(&dir.file_path("none.toml"), &cli).is_err());
        });
    }

    #[test]
    fn config_path_honours_env() {
        with_env(&[(ENV_CONFIG, "/tmp/tokenmeter-test/config.toml")], || {
            assert_eq!(Config::config_path(), PathBuf::from("/tmp/tokenmeter-test/config.toml"));
        });
    }

    #[test]
    fn config_source_display() {
        assert_eq!(ConfigSource::Env.to_string(), "environment variable");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }
}
