//! Registration lifecycle against the signaling server.
//!
//! [`RegistrationController`] owns the connection/registration state and the
//! transport itself: `start()` validates configuration, connects, and spawns
//! the single dispatch task that consumes transport events; `stop()` tears
//! everything down and resets the call state (an active call cannot outlive
//! its registration).
//!
//! State is published two ways: a `watch` channel (internal truth, read by
//! the session controller to gate dialing) and the broadcast channel every
//! observer subscribes to. Both are equality-suppressed — an unchanged state
//! is never re-published.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use dialtone_settings_core::{SecretVault, Settings};

use crate::error::{Error, Result};
use crate::events::PhoneEvent;
use crate::session::SessionController;
use crate::transport::{EndpointConfig, SignalingTransport, TransportEvent};

/// Vault account id for the SIP password of `username`.
pub fn sip_vault_account(username: &str) -> String {
    format!("sip/{username}")
}

/// Connection/registration state against the signaling server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RegistrationState {
    Unregistered,
    /// Transport-level connection in progress.
    Connecting,
    /// Connected, registration not yet confirmed.
    Connected,
    /// Registered and reachable.
    Registered,
    /// Terminal for the current attempt; a fresh `start()` may retry.
    Failed { reason: String },
}

impl RegistrationState {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "Unregistered"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Registered => write!(f, "Registered"),
            Self::Failed { reason } => write!(f, "Failed({reason})"),
        }
    }
}

/// Owns the transport and the registration state machine.
#[derive(Clone)]
pub struct RegistrationController {
    transport: Arc<dyn SignalingTransport>,
    settings: Arc<RwLock<Settings>>,
    vault: Arc<dyn SecretVault>,
    session: SessionController,
    state: Arc<watch::Sender<RegistrationState>>,
    events: broadcast::Sender<PhoneEvent>,
}

impl RegistrationController {
    pub(crate) fn new(
        transport: Arc<dyn SignalingTransport>,
        settings: Arc<RwLock<Settings>>,
        vault: Arc<dyn SecretVault>,
        session: SessionController,
        state: watch::Sender<RegistrationState>,
        events: broadcast::Sender<PhoneEvent>,
    ) -> Self {
        Self {
            transport,
            settings,
            vault,
            session,
            state: Arc::new(state),
            events,
        }
    }

    /// Current registration state.
    pub fn state(&self) -> RegistrationState {
        self.state.borrow().clone()
    }

    /// Connect and register using the current configuration.
    ///
    /// No-op when already connecting or registered. Fails fast (state
    /// `Failed("config")`) when the server address, account identifier, or
    /// vault-held password is missing — no connection is attempted.
    pub async fn start(&self) -> Result<()> {
        match self.state() {
            RegistrationState::Connecting
            | RegistrationState::Connected
            | RegistrationState::Registered => {
                debug!("registration already in progress, start() is a no-op");
                return Ok(());
            }
            _ => {}
        }

        let settings = self.settings.read().await.clone();
        if settings.sip_server.is_empty() || settings.sip_username.is_empty() {
            self.transition(RegistrationState::failed("config"));
            return Err(Error::Configuration {
                message: "registration requires sipServer and sipUsername".into(),
            });
        }

        let password = match self
            .vault
            .retrieve(&sip_vault_account(&settings.sip_username))
        {
            Ok(password) => password,
            Err(e) => {
                self.transition(RegistrationState::failed("config"));
                return Err(e.into());
            }
        };

        let endpoint = endpoint_config(&settings, password)?;
        info!(server = %endpoint.server_uri, uri = %endpoint.sip_uri, "starting registration");

        // Subscribe before starting so no early event is missed.
        let mut rx = self.transport.subscribe();
        self.transition(RegistrationState::Connecting);

        if let Err(e) = self.transport.start(&endpoint).await {
            warn!(error = %e, "transport start failed");
            self.transition(RegistrationState::failed(e.to_string()));
            return Err(Error::Transport {
                message: e.to_string(),
            });
        }

        let this = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                this.dispatch(event).await;
            }
            debug!("transport event stream closed");
        });

        Ok(())
    }

    /// Unregister (when registered), stop the transport, and reset the call
    /// state to Idle.
    ///
    /// The `Unregistered` state normally settles via the event path; it is
    /// forced here only when the transport is already gone, and a `Failed`
    /// state is never overwritten.
    pub async fn stop(&self) {
        if self.state() == RegistrationState::Registered {
            if let Err(e) = self.transport.unregister().await {
                warn!(error = %e, "unregister request failed");
            }
        }

        self.transport.stop().await;
        self.session.reset_to_idle().await;

        if !self.state().is_failed() {
            self.transition(RegistrationState::Unregistered);
        }
        info!("registration stopped");
    }

    /// Single consumer of transport events: registration events are handled
    /// here, session events forwarded to the session controller.
    async fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connecting => self.transition(RegistrationState::Connecting),
            TransportEvent::Connected => self.transition(RegistrationState::Connected),
            TransportEvent::Registered => self.transition(RegistrationState::Registered),
            TransportEvent::Unregistered => {
                // A late unregister must not mask an earlier failure.
                if !self.state().is_failed() {
                    self.transition(RegistrationState::Unregistered);
                }
            }
            TransportEvent::RegistrationFailed { cause } => {
                warn!(%cause, "registration failed");
                self.transition(RegistrationState::failed(cause));
                self.stop().await;
            }
            TransportEvent::Disconnected => {
                if !self.state().is_failed() {
                    self.transition(RegistrationState::Unregistered);
                }
                self.stop().await;
            }
            session_event => self.session.handle_event(session_event).await,
        }
    }

    /// Equality-suppressed state change + broadcast.
    fn transition(&self, new: RegistrationState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == new {
                false
            } else {
                info!(from = %current, to = %new, "registration state changed");
                *current = new.clone();
                true
            }
        });

        if changed {
            let _ = self
                .events
                .send(PhoneEvent::RegistrationStatusChanged { state: new });
        }
    }
}

/// Build the transport endpoint from configuration.
///
/// Socket URI is `{scheme}://{server}:{port}` with the scheme's default port
/// when none is pinned; the address of record is `sip:{username}@{server}`.
fn endpoint_config(settings: &Settings, password: SecretString) -> Result<EndpointConfig> {
    let scheme = settings.sip_transport.scheme();
    let port = settings
        .sip_port
        .unwrap_or_else(|| settings.sip_transport.default_port());

    let server_uri: url::Url = format!("{scheme}://{}:{port}", settings.sip_server)
        .parse()
        .map_err(|e| Error::Configuration {
            message: format!("invalid sipServer '{}': {e}", settings.sip_server),
        })?;

    let display_name = if settings.sip_display_name.is_empty() {
        settings.sip_username.clone()
    } else {
        settings.sip_display_name.clone()
    };

    Ok(EndpointConfig {
        server_uri,
        sip_uri: format!("sip:{}@{}", settings.sip_username, settings.sip_server),
        display_name,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(server: &str, user: &str) -> Settings {
        let mut s = Settings::default();
        s.sip_server = server.into();
        s.sip_username = user.into();
        s
    }

    #[test]
    fn endpoint_uses_transport_default_port() {
        let endpoint = endpoint_config(
            &settings("sip.example.com", "alice"),
            SecretString::from("pw".to_string()),
        )
        .unwrap();

        assert_eq!(endpoint.server_uri.as_str(), "wss://sip.example.com:443/");
        assert_eq!(endpoint.sip_uri, "sip:alice@sip.example.com");
        assert_eq!(endpoint.display_name, "alice");
    }

    #[test]
    fn endpoint_honors_pinned_port_and_plain_ws() {
        let mut s = settings("pbx.local", "bob");
        s.sip_port = Some(8088);
        s.sip_transport = dialtone_settings_core::SipTransport::Ws;
        s.sip_display_name = "Bob".into();

        let endpoint = endpoint_config(&s, SecretString::from("pw".to_string())).unwrap();
        assert_eq!(endpoint.server_uri.as_str(), "ws://pbx.local:8088/");
        assert_eq!(endpoint.display_name, "Bob");
    }

    #[test]
    fn invalid_server_is_a_configuration_error() {
        let err = endpoint_config(
            &settings("not a host", "alice"),
            SecretString::from("pw".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn failed_state_displays_its_reason() {
        assert_eq!(
            RegistrationState::failed("401 Unauthorized").to_string(),
            "Failed(401 Unauthorized)"
        );
    }
}
