//! Phase-tagged test logging.
#![allow(dead_code)]
//!
//! Writes one line per event to stderr so a failing test shows how far it
//! got. `TEST_LOG_JSON=1` switches to JSON lines for CI parsing.
//!
//! ```rust,ignore
//! let log = TestLogger::new("budget_alert_fires_once");
//! log.phase("setup");
//! // ...
//! log.finish_ok();
//! ```

use std::env;
use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    timestamp: String,
    test: &'a str,
    phase: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u128>,
}

/// Per-test logger with phase and duration tracking.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
    phase: Mutex<String>,
    json: bool,
}

impl TestLogger {
    #[must_use]
    pub fn new(test_name: &str) -> Self {
        let logger = Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
            phase: Mutex::new("init".to_string()),
            json: env::var("TEST_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        };
        logger.emit("Test starting", None);
        logger
    }

    pub fn phase(&self, phase: &str) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.to_string();
        }
    }

    pub fn info(&self, message: &str) {
        self.emit(message, None);
    }

    pub fn http_request(&self, method: &str, url: &str) {
        self.emit(&format!("HTTP {method} {url}"), None);
    }

    pub fn finish_ok(&self) {
        let elapsed = self.start_time.elapsed().as_millis();
        self.emit("Test passed", Some(elapsed));
    }

    fn emit(&self, message: &str, duration_ms: Option<u128>) {
        let phase = self
            .phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|_| "?".to_string());
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        if self.json {
            let entry = LogEntry {
                timestamp,
                test: &self.test_name,
                phase: &phase,
                message,
                duration_ms,
            };
            if let Ok(line) = serde_json::to_string(&entry) {
                eprintln!("{line}");
            }
        } else {
            let suffix = duration_ms.map(|ms| format!(" ({ms}ms)")).unwrap_or_default();
            eprintln!("[{timestamp}] [{}] [{phase}] {message}{suffix}", self.test_name);
        }
    }
}
