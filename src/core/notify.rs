//! Notification sinks.
//!
//! Delivery is fire-and-forget: a sink never reports failure back to the
//! aggregator and nothing is retried.

use std::io::Write;

use colored::Colorize;

/// Receives alerts that passed de-duplication.
pub trait NotificationSink: Send + Sync {
    fn send(&self, title: &str, body: &str);
}

/// Emits alerts as `warn` log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn send(&self, title: &str, body: &str) {
        tracing::warn!(title, body, "Alert");
    }
}

/// Prints alerts to stderr, highlighted when color is enabled.
#[derive(Debug, Clone, Copy)]
pub struct TerminalSink {
    color: bool,
}

impl TerminalSink {
    #[must_use]
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    fn format(&self, title: &str, body: &str) -> String {
        let title = if self.color {
            title.bold().yellow().to_string()
        } else {
            title.to_string()
        };
        let body = body
            .lines()
            .map(|line| format!("  {line}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{title}\n{body}\n")
    }
}

impl NotificationSink for TerminalSink {
    fn send(&self, title: &str, body: &str) {
        let text = self.format(title, body);
        if let Err(err) = std::io::stderr().lock().write_all(text.as_bytes()) {
            tracing::debug!(error = %err, "Dropped terminal notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn plain_terminal_format_indents_body() {
        let sink = TerminalSink::new(false);
        assert_eq!(
            sink.format("TokenMeter: Budget Alert", "Daily spend: $9.91 / $10.00 (99%)\nTop: Anthropic ($8.50)"),
            "TokenMeter: Budget Alert\n  Daily spend: $9.91 / $10.00 (99%)\n  Top: Anthropic ($8.50)\n"
        );
    }

    #[traced_test]
    #[test]
    fn tracing_sink_logs_alert() {
        TracingSink.send("TokenMeter: Rate Limit", "Anthropic: ~8 requests left. Resets in 12 min.");
        assert!(logs_contain("TokenMeter: Rate Limit"));
    }
}
