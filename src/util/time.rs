//! Rate-limit reset parsing and formatting.

use chrono::{DateTime, TimeDelta, Utc};

/// Parse a rate-limit reset header value into an absolute time.
///
/// Vendors disagree on the encoding, so this accepts:
/// - RFC 3339 timestamps (`2026-02-01T12:00:00Z`)
/// - plain integer seconds from now (`42`)
/// - Go-style durations (`1m30s`, `6m0s`, `850ms`, `2h`)
#[must_use]
pub fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }

    if let Ok(seconds) = value.parse::<f64>() {
        return seconds_to_delta(seconds).and_then(|delta| now.checked_add_signed(delta));
    }

    parse_duration(value).and_then(|delta| now.checked_add_signed(delta))
}

fn seconds_to_delta(seconds: f64) -> Option<TimeDelta> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    TimeDelta::try_milliseconds((seconds * 1000.0).round() as i64)
}

fn parse_duration(value: &str) -> Option<TimeDelta> {
    let mut total_ms = 0.0_f64;
    let mut number = String::new();
    let mut chars = value.chars().peekable();
    let mut saw_unit = false;

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }

        let amount: f64 = number.parse().ok()?;
        number.clear();
        let unit_ms = match c {
            'h' => 3_600_000.0,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1.0
            }
            'm' => 60_000.0,
            's' => 1_000.0,
            _ => return None,
        };
        total_ms += amount * unit_ms;
        saw_unit = true;
    }

    if !number.is_empty() || !saw_unit {
        return None;
    }
    seconds_to_delta(total_ms / 1000.0)
}

/// Render the time until reset: `"< 1 min"` under a minute, else whole minutes.
///
/// An unknown reset renders as `"unknown"`.
#[must_use]
pub fn format_reset_window(resets_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(resets_at) = resets_at else {
        return "unknown".to_string();
    };

    let minutes = resets_at.signed_duration_since(now).num_seconds().max(0) / 60;
    if minutes < 1 {
        "< 1 min".to_string()
    } else {
        format!("{minutes} min")
    }
}
