//! Tracing subscriber setup.
//!
//! Logs always go to stderr (or a file), never stdout, so `--json` output
//! stays machine-readable while `watch` is running.

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_LEVEL_ENV: &str = "TOKENMETER_LOG";
const LOG_FORMAT_ENV: &str = "TOKENMETER_LOG_FORMAT";
const LOG_FILE_ENV: &str = "TOKENMETER_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Json,
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Parse a level name. Accepts the usual aliases (`warning`, `verbose`).
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" | "verbose" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Human,
            file: None,
        }
    }
}

impl LogSettings {
    /// Merge CLI flags with the environment.
    ///
    /// Level: `--log-level`, then `TOKENMETER_LOG`, then `warn` (`debug` with
    /// `--verbose`). Format: `--json-output`, then `TOKENMETER_LOG_FORMAT`.
    #[must_use]
    pub fn resolve(cli_level: Option<&str>, json_output: bool, verbose: bool) -> Self {
        let default_level = if verbose { Level::DEBUG } else { Level::WARN };
        let level = cli_level
            .and_then(parse_level)
            .or_else(|| env_value(LOG_LEVEL_ENV).as_deref().and_then(parse_level))
            .unwrap_or(default_level);

        let format = if json_output {
            LogFormat::Json
        } else {
            env_value(LOG_FORMAT_ENV)
                .as_deref()
                .and_then(LogFormat::from_arg)
                .unwrap_or_default()
        };

        Self {
            level,
            format,
            file: env_value(LOG_FILE_ENV).map(PathBuf::from),
        }
    }

    fn filter(&self) -> EnvFilter {
        // RUST_LOG wins when set.
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "tokenmeter={}",
                self.level.as_str().to_lowercase()
            ))
        })
    }

    fn writer(&self) -> BoxMakeWriter {
        let file = self.file.as_ref().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        match file {
            Some(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
            None => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(settings: &LogSettings) {
    let filter = settings.filter();
    let writer = settings.writer();

    match settings.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(writer)
                .with_span_events(FmtSpan::CLOSE)
                .try_init()
                .ok();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .with_writer(writer)
                .with_target(true)
                .try_init()
                .ok();
        }
        LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_target(false)
                .without_time()
                .try_init()
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[allow(unsafe_code)]
    fn with_env_var(key: &str, value: &str, f: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().unwrap();
        let prior = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value);
        }
        f();
        match prior {
            Some(val) => unsafe {
                std::env::set_var(key, val);
            },
            None => unsafe {
                std::env::remove_var(key);
            },
        }
    }

    #[test]
    fn level_aliases() {
        assert_eq!(parse_level("Warning"), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), Some(Level::DEBUG));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn cli_level_beats_env() {
        with_env_var(LOG_LEVEL_ENV, "trace", || {
            assert_eq!(LogSettings::resolve(Some("error"), false, false).level, Level::ERROR);
            assert_eq!(LogSettings::resolve(None, false, false).level, Level::TRACE);
        });
    }

    #[test]
    fn verbose_raises_default_level() {
        with_env_var(LOG_LEVEL_ENV, "", || {
            assert_eq!(LogSettings::resolve(None, false, false).level, Level::WARN);
            assert_eq!(LogSettings::resolve(None, false, true).level, Level::DEBUG);
        });
    }

    #[test]
    fn json_output_flag_selects_json() {
        with_env_var(LOG_FORMAT_ENV, "compact", || {
            assert_eq!(LogSettings::resolve(None, true, false).format, LogFormat::Json);
            assert_eq!(LogSettings::resolve(None, false, false).format, LogFormat::Compact);
        });
    }
}
