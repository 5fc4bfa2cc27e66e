//! Number and name formatting utilities.

/// Format a ratio (0.482) as a whole percentage ("48%").
#[must_use]
pub fn format_percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Format a cost in USD.
#[must_use]
pub fn format_cost(value: f64) -> String {
    format!("${value:.2}")
}

/// Format a token count compactly.
#[must_use]
pub fn format_tokens(value: u64) -> String {
    fn format_compact(value: u64, divisor: u64, suffix: &str) -> String {
        let major = value / divisor;
        let minor = (value % divisor) / (divisor / 10);
        format!("{major}.{minor}{suffix}")
    }

    if value >= 1_000_000 {
        format_compact(value, 1_000_000, "M")
    } else if value >= 1_000 {
        format_compact(value, 1_000, "K")
    } else {
        value.to_string()
    }
}

/// Human-friendly model name.
///
/// `claude-3-opus-20240229` -> `Claude 3 Opus 20240229`,
/// `gpt-4o-mini` -> `GPT 4o Mini`.
#[must_use]
pub fn display_model_name(model: &str) -> String {
    model
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| match part.to_lowercase().as_str() {
            "gpt" => "GPT".to_string(),
            _ => {
                let mut chars = part.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
