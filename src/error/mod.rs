//! Error types for tokenmeter.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! - **Network**: transport failures and timeouts talking to a provider
//! - **Provider**: non-success responses and malformed payloads
//! - **Configuration**: config file parsing and validation
//! - **Credential**: the OS credential store refused an operation
//! - **Internal**: I/O and serialization failures
//!
//! Network and Provider errors never leave the poll pipeline: provider adapters
//! turn them into a "no data" result. Only configuration, credential and
//! internal errors reach the CLI.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Provider,
    Configuration,
    Credential,
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network error",
            Self::Provider => "Provider error",
            Self::Configuration => "Configuration error",
            Self::Credential => "Credential error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Invalid configuration or arguments
    ConfigError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for tokenmeter operations.
#[derive(Error, Debug)]
pub enum TokenMeterError {
    // ==========================================================================
    // Network errors
    // ==========================================================================
    /// Request timed out.
    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("network error: {0}")]
    Network(String),

    // ==========================================================================
    // Provider errors
    // ==========================================================================
    /// Provider returned a non-success status.
    #[error("provider {provider} API error (HTTP {status_code}): {message}")]
    ProviderApi {
        provider: String,
        status_code: u16,
        message: String,
    },

    /// Failed to parse a provider response.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}' ({value}): {message}")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    /// Unknown provider name.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    // ==========================================================================
    // Credential errors
    // ==========================================================================
    /// Credential store operation failed.
    #[error("credential store error for {provider}: {message}")]
    Credential { provider: String, message: String },

    // ==========================================================================
    // Internal errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TokenMeterError {
    /// Map error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::ConfigInvalid { .. } | Self::InvalidProvider(_) => {
                ExitCode::ConfigError
            }
            Self::Timeout(_) => ExitCode::Timeout,
            Self::Network(_)
            | Self::ProviderApi { .. }
            | Self::ParseResponse(_)
            | Self::Credential { .. }
            | Self::Io(_)
            | Self::Json(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout(_) | Self::Network(_) => ErrorCategory::Network,
            Self::ProviderApi { .. } | Self::ParseResponse(_) => ErrorCategory::Provider,
            Self::Config(_) | Self::ConfigInvalid { .. } | Self::InvalidProvider(_) => {
                ErrorCategory::Configuration
            }
            Self::Credential { .. } => ErrorCategory::Credential,
            Self::Io(_) | Self::Json(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "TM-N001",
            Self::Network(_) => "TM-N099",
            Self::ProviderApi { .. } => "TM-P001",
            Self::ParseResponse(_) => "TM-P002",
            Self::Config(_) => "TM-C001",
            Self::ConfigInvalid { .. } => "TM-C002",
            Self::InvalidProvider(_) => "TM-C010",
            Self::Credential { .. } => "TM-K001",
            Self::Io(_) => "TM-X001",
            Self::Json(_) => "TM-X002",
        }
    }

    /// Whether an HTTP status indicates the credential itself was rejected.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            Self::ProviderApi {
                status_code: 401 | 403,
                ..
            }
        )
    }
}

/// Result type alias for tokenmeter operations.
pub type Result<T> = std::result::Result<T, TokenMeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_config_exit_code() {
        let err = TokenMeterError::ConfigInvalid {
            key: "budget.alert_threshold".to_string(),
            value: "1.5".to_string(),
            message: "must be between 0 and 1".to_string(),
        };
        assert_eq!(err.exit_code(), ExitCode::ConfigError);
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.error_code(), "TM-C002");
    }

    #[test]
    fn timeout_maps_to_timeout_exit_code() {
        let err = TokenMeterError::Timeout(20);
        assert_eq!(err.exit_code(), ExitCode::Timeout);
        assert_eq!(i32::from(err.exit_code()), 4);
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn auth_rejection_detects_401_and_403() {
        for status_code in [401, 403] {
            let err = TokenMeterError::ProviderApi {
                provider: "anthropic".to_string(),
                status_code,
                message: "denied".to_string(),
            };
            assert!(err.is_auth_rejection());
        }
        let err = TokenMeterError::ProviderApi {
            provider: "openai".to_string(),
            status_code: 500,
            message: "boom".to_string(),
        };
        assert!(!err.is_auth_rejection());
    }

    #[test]
    fn display_includes_status() {
        let err = TokenMeterError::ProviderApi {
            provider: "openai".to_string(),
            status_code: 429,
            message: "slow down".to_string(),
        };
        assert!(err.to_string().contains("HTTP 429"));
    }
}
