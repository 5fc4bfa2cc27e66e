//! Configuration file and platform paths.

pub mod config;
pub mod paths;

pub use config::{
    CliOverrides, Config, ConfigSource, ConfigSources, ENV_ALERT_THRESHOLD, ENV_CONFIG,
    ENV_DAILY_BUDGET, ENV_NO_COLOR_STD, ENV_POLL_INTERVAL, ENV_TIMEOUT, HttpConfig, OutputConfig,
    ResolvedConfig,
};
pub use paths::AppPaths;
