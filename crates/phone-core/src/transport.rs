//! The signaling-transport boundary.
//!
//! The underlying SIP/media library is an external collaborator behind
//! [`SignalingTransport`]: it emits connection, registration, and session
//! lifecycle events through one channel and exposes the call-control
//! operations the controllers invoke. Controllers never reach past this
//! seam, and tests drive the whole core through a mock implementation.

use std::fmt;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque handle for one signaling session, assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which side created a session or initiated a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Originator {
    Local,
    Remote,
}

/// How to terminate a session.
///
/// The variants map to distinct signaling responses; the session controller
/// picks one from the current call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    /// Reject a ringing inbound call (603 Decline).
    Decline,
    /// Abandon an outbound attempt (487 Request Terminated).
    Cancel,
    /// Refuse a session the controller never adopted (486 Busy Here).
    Busy,
    /// Normal teardown of an established call (BYE).
    Bye,
}

impl TerminateReason {
    /// Signaling status code for reject-style terminations.
    pub fn status_code(self) -> Option<u16> {
        match self {
            Self::Decline => Some(603),
            Self::Cancel => Some(487),
            Self::Busy => Some(486),
            Self::Bye => None,
        }
    }
}

/// Media constraints for placing or answering a call.
///
/// This system is audio-only; the constraint carries at most a preferred
/// capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOptions {
    /// Capture device id, `None` for the platform default.
    pub input_device: Option<String>,
}

impl MediaOptions {
    /// Audio-only media using `input_device`, with `"default"` and empty ids
    /// normalized to the platform default.
    pub fn audio_only(input_device: impl Into<String>) -> Self {
        let id = input_device.into();
        Self {
            input_device: if id.is_empty() || id == "default" {
                None
            } else {
                Some(id)
            },
        }
    }
}

/// Everything the transport needs to connect and register.
pub struct EndpointConfig {
    /// WebSocket endpoint, e.g. `wss://sip.example.com:443`.
    pub server_uri: url::Url,
    /// Address of record, e.g. `sip:alice@sip.example.com`.
    pub sip_uri: String,
    pub display_name: String,
    pub password: SecretString,
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("server_uri", &self.server_uri.as_str())
            .field("sip_uri", &self.sip_uri)
            .field("display_name", &self.display_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lifecycle events emitted by the transport.
///
/// Session events carry the [`SessionId`] they concern; the controllers drop
/// events for sessions they do not own.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    // Connection / registration
    Connecting,
    Connected,
    Registered,
    Unregistered,
    RegistrationFailed { cause: String },
    Disconnected,

    // Sessions
    NewSession {
        session: SessionId,
        origin: Originator,
        remote: String,
    },
    SessionAccepted { session: SessionId },
    SessionConfirmed { session: SessionId },
    SessionHeld {
        session: SessionId,
        originator: Originator,
    },
    SessionResumed { session: SessionId },
    SessionMuted { session: SessionId, muted: bool },
    SessionEnded { session: SessionId, cause: String },
    SessionFailed { session: SessionId, cause: String },
}

/// Error from a transport operation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// The signaling/media library seam.
///
/// Operations are fire-and-forget from the state machine's point of view:
/// an `Ok` return means the request was issued, and the matching state
/// settles only when the corresponding [`TransportEvent`] arrives.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Obtain the event stream for the next `start`. The stream closes when
    /// the transport stops.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Connect and register with the signaling server.
    async fn start(&self, endpoint: &EndpointConfig) -> Result<(), TransportError>;

    /// Tear the connection down and release resources.
    async fn stop(&self);

    /// Request de-registration; completion arrives as `Unregistered`.
    async fn unregister(&self) -> Result<(), TransportError>;

    /// Place an outgoing call; the adopted session arrives as
    /// `NewSession { origin: Local, .. }`.
    async fn call(&self, target_uri: &str, media: &MediaOptions)
        -> Result<SessionId, TransportError>;

    /// Answer a ringing inbound session.
    async fn answer(&self, session: &SessionId, media: &MediaOptions)
        -> Result<(), TransportError>;

    /// Terminate a session with the given reason.
    async fn terminate(
        &self,
        session: &SessionId,
        reason: TerminateReason,
    ) -> Result<(), TransportError>;

    /// Put a session on hold.
    async fn hold(&self, session: &SessionId) -> Result<(), TransportError>;

    /// Resume a held session.
    async fn resume(&self, session: &SessionId) -> Result<(), TransportError>;

    /// Toggle microphone mute for a session.
    async fn set_muted(&self, session: &SessionId, muted: bool) -> Result<(), TransportError>;
}
