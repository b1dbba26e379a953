//! Error taxonomy for the session manager.
//!
//! Every public operation returns `Result<_, Error>` rather than letting a
//! failure escape as a panic; internal event handlers log and force the
//! owning state machine to its nearest safe state instead of surfacing
//! errors. Session conflicts (a second inbound call) are resolved at the
//! transport boundary and deliberately have no variant here.

use thiserror::Error;

use dialtone_settings_core::{SettingsError, VaultError};

/// Result type for session-manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which provisioning step failed (steps after the safe-config persist;
/// earlier failures surface as [`Error::Vault`] or [`Error::Configuration`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    /// Fetching the phone number's canonical string by SID.
    NumberFetch,
    /// Finding, creating, or updating the managed voice application.
    Application,
    /// Binding the phone number to the application.
    NumberBinding,
}

impl std::fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NumberFetch => write!(f, "number fetch failed"),
            Self::Application => write!(f, "application provisioning failed"),
            Self::NumberBinding => write!(f, "number binding failed"),
        }
    }
}

/// Top-level error for `dialtone-phone-core`.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid required fields. Never retried automatically;
    /// the caller must correct the configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Configuration persistence failed.
    #[error("configuration storage error: {0}")]
    Settings(#[from] SettingsError),

    /// Secret store/retrieve failed. Fatal to the current operation.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Calling-platform REST failure. The 401-class case renders as an
    /// authentication-failed message via the platform error's Display.
    #[error(transparent)]
    Platform(#[from] dialtone_platform_api::Error),

    /// A provisioning step failed after earlier steps were persisted.
    /// Re-running `activate` resumes without re-entering secrets.
    #[error("{step}: {message}")]
    Provisioning {
        step: ProvisioningStep,
        message: String,
    },

    /// Signaling transport failure.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// A call operation requires an active registration.
    #[error("not registered -- cannot place calls")]
    NotRegistered,

    /// A call operation requires the single session slot to be free.
    #[error("another call is already in progress")]
    CallInProgress,

    /// A call operation requires a current session.
    #[error("no active call")]
    NoActiveCall,

    /// The current call is in the wrong state for the operation.
    #[error("invalid call state: expected {expected}, call is {actual}")]
    InvalidCallState {
        expected: &'static str,
        actual: String,
    },
}

impl Error {
    /// True iff the failure stems from credentials the user must fix.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Platform(e) if e.is_auth_error())
    }
}
