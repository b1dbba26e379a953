//! Secret storage keyed by (service id, account id).
//!
//! The production implementation wraps the OS keychain via `keyring`; the
//! in-memory one backs tests and headless environments where no secret
//! service is available. Values are handled as [`SecretString`] end to end
//! and never appear in the persisted configuration record.

use std::collections::HashMap;
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;

/// Service identifier under which every dialtone secret is filed.
pub const VAULT_SERVICE: &str = "dialtone";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum VaultError {
    /// No secret stored under the given account id.
    #[error("no secret stored for '{account}'")]
    NotFound { account: String },

    /// The underlying secret service failed.
    #[error("secret store error: {message}")]
    Backend { message: String },
}

// ── Capability ──────────────────────────────────────────────────────

/// Store/retrieve of a single secret value per account id.
///
/// Entries are keyed, not singleton: the platform API key secret lives under
/// the API key SID, the SIP password under `sip/{username}`.
pub trait SecretVault: Send + Sync {
    fn store(&self, account: &str, secret: &SecretString) -> Result<(), VaultError>;
    fn retrieve(&self, account: &str) -> Result<SecretString, VaultError>;
    fn delete(&self, account: &str) -> Result<(), VaultError>;
}

// ── OS keychain implementation ──────────────────────────────────────

/// [`SecretVault`] backed by the OS keychain.
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    pub fn new() -> Self {
        Self {
            service: VAULT_SERVICE.to_string(),
        }
    }

    /// Use a non-default service id (parallel test installs).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, account: &str) -> Result<keyring::Entry, VaultError> {
        keyring::Entry::new(&self.service, account).map_err(|e| VaultError::Backend {
            message: e.to_string(),
        })
    }
}

impl SecretVault for KeyringVault {
    fn store(&self, account: &str, secret: &SecretString) -> Result<(), VaultError> {
        self.entry(account)?
            .set_password(secret.expose_secret())
            .map_err(|e| VaultError::Backend {
                message: e.to_string(),
            })?;
        debug!(service = %self.service, account, "secret stored");
        Ok(())
    }

    fn retrieve(&self, account: &str) -> Result<SecretString, VaultError> {
        match self.entry(account)?.get_password() {
            Ok(secret) => Ok(SecretString::from(secret)),
            Err(keyring::Error::NoEntry) => Err(VaultError::NotFound {
                account: account.to_string(),
            }),
            Err(e) => Err(VaultError::Backend {
                message: e.to_string(),
            }),
        }
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        match self.entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::Backend {
                message: e.to_string(),
            }),
        }
    }
}

// ── In-memory implementation ────────────────────────────────────────

/// [`SecretVault`] held in process memory.
///
/// For tests and environments without a secret service. Contents are lost on
/// drop.
#[derive(Default)]
pub struct MemoryVault {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretVault for MemoryVault {
    fn store(&self, account: &str, secret: &SecretString) -> Result<(), VaultError> {
        self.entries
            .lock()
            .expect("vault mutex poisoned")
            .insert(account.to_string(), secret.expose_secret().to_string());
        Ok(())
    }

    fn retrieve(&self, account: &str) -> Result<SecretString, VaultError> {
        self.entries
            .lock()
            .expect("vault mutex poisoned")
            .get(account)
            .map(|s| SecretString::from(s.clone()))
            .ok_or_else(|| VaultError::NotFound {
                account: account.to_string(),
            })
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        self.entries
            .lock()
            .expect("vault mutex poisoned")
            .remove(account);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
