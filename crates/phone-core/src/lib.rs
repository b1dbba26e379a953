//! # dialtone-phone-core
//!
//! The softphone session manager: owns the lifecycle of a signaling
//! registration and of at-most-one concurrent call, and mediates credential
//! provisioning against the calling-platform API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        UI boundary           │  commands in, broadcasts out
//! └──────────────┬───────────────┘
//!                │
//! ┌──────────────▼───────────────┐
//! │        SessionManager        │ ◄── this crate
//! │ ┌──────────────────────────┐ │
//! │ │ RegistrationController   │ │  connection/registration state
//! │ │ SessionController        │ │  the single call session
//! │ │ ProvisioningOrchestrator │ │  activate / tokens / numbers
//! │ └──────────────────────────┘ │
//! └───────┬──────────────┬───────┘
//!         │              │
//! ┌───────▼──────┐ ┌─────▼──────────────┐
//! │ Signaling    │ │ dialtone-platform- │
//! │ Transport    │ │ api / settings-core│
//! └──────────────┘ └────────────────────┘
//! ```
//!
//! The signaling/media library sits behind the [`SignalingTransport`] trait;
//! all of its lifecycle events funnel through one dispatch task, which keeps
//! every state mutation serialized — the single-session invariant is
//! structural, not lock-based. State changes are published on a broadcast
//! channel ([`SessionManager::subscribe`]); duplicates are suppressed.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dialtone_phone_core::{SessionManager, SignalingTransport};
//! use dialtone_settings_core::{KeyringVault, SettingsStore};
//!
//! async fn run(transport: Arc<dyn SignalingTransport>) -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SessionManager::builder(
//!         SettingsStore::open(),
//!         Arc::new(KeyringVault::new()),
//!         transport,
//!     )
//!     .build()?;
//!
//!     manager.start_registration().await?;
//!     manager.start_call("+15551234567").await?;
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod error;
pub mod events;
pub mod manager;
pub mod provisioning;
pub mod registration;
pub mod session;
pub mod transport;

pub use call::{CallDirection, CallSession, CallState};
pub use error::{Error, ProvisioningStep, Result};
pub use events::PhoneEvent;
pub use manager::{SessionManager, SessionManagerBuilder};
pub use provisioning::{ActivationRequest, PhoneNumberSummary, MANAGED_APP_NAME};
pub use registration::{sip_vault_account, RegistrationController, RegistrationState};
pub use session::{SessionController, IDLE_DECAY};
pub use transport::{
    EndpointConfig, MediaOptions, Originator, SessionId, SignalingTransport, TerminateReason,
    TransportError, TransportEvent,
};

// Re-export the neighbour crates' surface that appears in this API.
pub use dialtone_platform_api::PlatformCredentials;
pub use dialtone_settings_core::{Settings, SettingsPatch, SettingsStore};
