//! Broadcast events published to every observer.
//!
//! All state changes flow through one `tokio::sync::broadcast` channel; UI
//! windows (or anything else) subscribe via
//! [`SessionManager::subscribe`](crate::SessionManager::subscribe). Senders
//! ignore the no-receiver error — publishing is fire-and-forget, and a lagged
//! subscriber only loses its own backlog.

use serde::{Deserialize, Serialize};

use dialtone_settings_core::Settings;

use crate::call::CallState;
use crate::registration::RegistrationState;

/// Capacity of the broadcast channel (events per slow subscriber).
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// State-change notifications published by the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PhoneEvent {
    /// Registration state changed (duplicates suppressed).
    RegistrationStatusChanged { state: RegistrationState },

    /// Call state changed; `caller` is set when entering `Incoming`.
    CallStateChanged {
        state: CallState,
        #[serde(skip_serializing_if = "Option::is_none")]
        caller: Option<String>,
    },

    /// Microphone mute toggled (transport-confirmed).
    MuteStatusChanged { muted: bool },

    /// The persisted configuration changed. The payload is the full safe
    /// record — the type carries no secret field.
    ConfigurationUpdated { settings: Settings },

    /// Out-of-band failure not tied to a specific request/response.
    Error { message: String },
}
