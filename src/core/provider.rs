//! Provider descriptors.
//!
//! Defines the AI vendors whose billing/usage APIs are tracked.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenMeterError};

// =============================================================================
// Provider Enum
// =============================================================================

/// Supported AI API vendors.
///
/// Declaration order is display order; the derived `Ord` makes it the
/// iteration order of the snapshot map as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Google,
    #[serde(rename = "xai")]
    XAi,
}

impl Provider {
    /// All providers in display order.
    pub const ALL: &'static [Self] = &[Self::Anthropic, Self::OpenAI, Self::Google, Self::XAi];

    /// CLI name for this provider.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
            Self::Google => "google",
            Self::XAi => "xai",
        }
    }

    /// Display name for human output and notifications.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::OpenAI => "OpenAI",
            Self::Google => "Google AI",
            Self::XAi => "xAI",
        }
    }

    /// Key under which this provider's API credential is stored.
    #[must_use]
    pub const fn credential_key(self) -> &'static str {
        self.cli_name()
    }

    /// Whether the vendor exposes a usage/billing endpoint at all.
    #[must_use]
    pub const fn has_usage_api(self) -> bool {
        matches!(self, Self::Anthropic | Self::OpenAI)
    }

    /// Whether rate-limit state can be probed for this vendor.
    #[must_use]
    pub const fn has_rate_limit_probe(self) -> bool {
        matches!(self, Self::Anthropic)
    }

    /// Parse from a CLI argument or config key.
    ///
    /// Accepts the CLI name, the display name, and a few common aliases.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "gpt" => Ok(Self::OpenAI),
            "google" | "google ai" | "gemini" => Ok(Self::Google),
            "xai" | "grok" => Ok(Self::XAi),
            _ => Err(TokenMeterError::InvalidProvider(name.to_string())),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_names_and_aliases() {
        assert_eq!(Provider::from_cli_name("anthropic").unwrap(), Provider::Anthropic);
        assert_eq!(Provider::from_cli_name("Claude").unwrap(), Provider::Anthropic);
        assert_eq!(Provider::from_cli_name("OPENAI").unwrap(), Provider::OpenAI);
        assert_eq!(Provider::from_cli_name("Google AI").unwrap(), Provider::Google);
        assert_eq!(Provider::from_cli_name(" xai ").unwrap(), Provider::XAi);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = Provider::from_cli_name("mistral").unwrap_err();
        assert!(matches!(err, TokenMeterError::InvalidProvider(name) if name == "mistral"));
    }

    #[test]
    fn ordering_matches_display_order() {
        let mut sorted = vec![Provider::XAi, Provider::Google, Provider::Anthropic, Provider::OpenAI];
        sorted.sort();
        assert_eq!(sorted, Provider::ALL);
    }

    #[test]
    fn serde_uses_cli_names() {
        for &provider in Provider::ALL {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider.cli_name()));
        }
    }

    #[test]
    fn only_billing_vendors_have_usage_api() {
        assert!(Provider::Anthropic.has_usage_api());
        assert!(Provider::OpenAI.has_usage_api());
        assert!(!Provider::Google.has_usage_api());
        assert!(!Provider::XAi.has_usage_api());
    }
}
