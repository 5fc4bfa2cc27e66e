//! HTTP client utilities.
//!
//! Provides the shared HTTP client used by every provider adapter.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, RequestBuilder, Response};

use super::provider::Provider;
use crate::error::{Result, TokenMeterError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Longest response body excerpt kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("tokenmeter/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TokenMeterError::Network(e.to_string()))
}

/// Send a request and require a 2xx status.
///
/// The response is returned unread so callers can inspect headers.
///
/// # Errors
///
/// Returns `Timeout`/`Network` on transport failure and `ProviderApi` on a
/// non-success status.
pub async fn send_checked(
    provider: Provider,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Response> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            TokenMeterError::Timeout(timeout.as_secs())
        } else {
            TokenMeterError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        return Err(TokenMeterError::ProviderApi {
            provider: provider.cli_name().to_string(),
            status_code: status.as_u16(),
            message: if message.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                message
            },
        });
    }

    Ok(response)
}

/// Send a request and decode a JSON body.
///
/// # Errors
///
/// Returns error on network failure, non-success status, or JSON parse failure.
pub async fn fetch_json<T: serde::de::DeserializeOwned>(
    provider: Provider,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<T> {
    send_checked(provider, request, timeout)
        .await?
        .json()
        .await
        .map_err(|e| TokenMeterError::ParseResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_in_recommended_range() {
        assert!(DEFAULT_TIMEOUT >= Duration::from_secs(10));
        assert!(DEFAULT_TIMEOUT <= Duration::from_secs(30));
    }

    #[test]
    fn client_builds() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
