//! Persistent configuration and secret storage for the dialtone softphone.
//!
//! Two capabilities live here, shared by the registration and provisioning
//! layers in `dialtone-phone-core`:
//!
//! - [`SettingsStore`] — a typed, versionless configuration record persisted
//!   as TOML. Loading always merges the file over [`Settings::default()`], so
//!   every known key exists after a load and unknown keys can never enter the
//!   persisted state.
//! - [`SecretVault`] — store/retrieve of a single secret value keyed by
//!   (service id, account id), backed by the OS keychain in production and an
//!   in-memory map for tests and headless environments.
//!
//! Secrets are excluded from [`Settings`] structurally: the type has no
//! secret-shaped field, so nothing a caller passes to the store can ever be
//! written to disk as a credential.

pub mod config;
pub mod vault;

pub use config::{Settings, SettingsError, SettingsPatch, SettingsStore, SipTransport};
pub use vault::{KeyringVault, MemoryVault, SecretVault, VaultError, VAULT_SERVICE};
