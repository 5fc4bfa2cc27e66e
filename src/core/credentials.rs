//! API credential storage.
//!
//! The aggregator only needs `get`; a provider without a stored credential is
//! treated as disabled, never as an error.

use super::provider::Provider;
use crate::error::{Result, TokenMeterError};

/// Keyring service name under which all credentials are stored.
pub const KEYRING_SERVICE: &str = "tokenmeter";

/// Where provider API keys live.
pub trait CredentialStore: Send + Sync {
    /// The stored credential, or `None` if the provider is not configured.
    fn get(&self, provider: Provider) -> Option<String>;

    /// Store or replace a credential.
    ///
    /// # Errors
    ///
    /// Returns `Credential` if the backing store rejects the write.
    fn save(&self, provider: Provider, value: &str) -> Result<()>;

    /// Remove a credential. Removing an absent credential succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Credential` if the backing store rejects the delete.
    fn delete(&self, provider: Provider) -> Result<()>;

    /// Whether a credential is stored.
    fn contains(&self, provider: Provider) -> bool {
        self.get(provider).is_some()
    }
}

/// OS keyring (macOS Keychain, Windows Credential Manager, Secret Service).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry(provider: Provider) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, provider.credential_key())
            .map_err(|e| credential_error(provider, &e))
    }
}

fn credential_error(provider: Provider, err: &keyring::Error) -> TokenMeterError {
    TokenMeterError::Credential {
        provider: provider.cli_name().to_string(),
        message: err.to_string(),
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, provider: Provider) -> Option<String> {
        let entry = match Self::entry(provider) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(provider = provider.cli_name(), error = %err, "Keyring unavailable");
                return None;
            }
        };
        match entry.get_password() {
            Ok(secret) if !secret.trim().is_empty() => Some(secret.trim().to_string()),
            Ok(_) | Err(keyring::Error::NoEntry) => None,
            Err(err) => {
                tracing::warn!(
                    provider = provider.cli_name(),
                    error = %err,
                    "Failed to read credential, treating provider as disabled"
                );
                None
            }
        }
    }

    fn save(&self, provider: Provider, value: &str) -> Result<()> {
        Self::entry(provider)?
            .set_password(value.trim())
            .map_err(|e| credential_error(provider, &e))?;
        tracing::info!(provider = provider.cli_name(), "Credential saved");
        Ok(())
    }

    fn delete(&self, provider: Provider) -> Result<()> {
        match Self::entry(provider)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                tracing::info!(provider = provider.cli_name(), "Credential deleted");
                Ok(())
            }
            Err(err) => Err(credential_error(provider, &err)),
        }
    }
}
