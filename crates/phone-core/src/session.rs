//! The at-most-one call session and its state machine.
//!
//! [`SessionController`] reacts to transport session events and exposes the
//! call-control operations. Two invariants shape everything here:
//!
//! - **Single session**: the transport-event handler is the only writer of
//!   the session slot and checks occupancy before adopting a new session; a
//!   concurrent session is refused with a busy signal and never represented
//!   in controller state.
//! - **No optimistic transitions**: requests only move the machine into the
//!   pending states (`Calling`/`Incoming`) or fail it outright. The
//!   established states (`Active`, `Held`, …) are entered exclusively on
//!   transport-confirmed events.
//!
//! `Ended`/`Failed` decay to `Idle` after [`IDLE_DECAY`]. A generation
//! counter guards the decay: any state change during the grace window
//! invalidates the pending reset, so a new call arriving mid-window is never
//! knocked back to `Idle`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use dialtone_settings_core::Settings;

use crate::call::{CallDirection, CallSession, CallState};
use crate::error::{Error, Result};
use crate::events::PhoneEvent;
use crate::registration::RegistrationState;
use crate::transport::{
    MediaOptions, Originator, SessionId, SignalingTransport, TerminateReason, TransportEvent,
};

/// Grace period before a terminal call state resets to `Idle`.
pub const IDLE_DECAY: Duration = Duration::from_secs(1);

/// Owns the call state machine and the single session slot.
#[derive(Clone)]
pub struct SessionController {
    transport: Arc<dyn SignalingTransport>,
    settings: Arc<RwLock<Settings>>,
    registration: watch::Receiver<RegistrationState>,
    events: broadcast::Sender<PhoneEvent>,
    state: Arc<RwLock<CallState>>,
    current: Arc<RwLock<Option<CallSession>>>,
    /// Bumped on every state change; a scheduled decay only fires if the
    /// generation it captured is still current.
    decay_generation: Arc<AtomicU64>,
}

impl SessionController {
    pub(crate) fn new(
        transport: Arc<dyn SignalingTransport>,
        settings: Arc<RwLock<Settings>>,
        registration: watch::Receiver<RegistrationState>,
        events: broadcast::Sender<PhoneEvent>,
    ) -> Self {
        Self {
            transport,
            settings,
            registration,
            events,
            state: Arc::new(RwLock::new(CallState::Idle)),
            current: Arc::new(RwLock::new(None)),
            decay_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current call state.
    pub async fn state(&self) -> CallState {
        self.state.read().await.clone()
    }

    /// The current session, if one is in flight.
    pub async fn current_session(&self) -> Option<CallSession> {
        self.current.read().await.clone()
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Place an outgoing call to `target` (a dial string, completed with the
    /// registered domain).
    ///
    /// Success means the request was issued; the state moves to `Calling`
    /// when the transport reports the new local session. A transport-level
    /// construction error fails the machine directly (`Failed("dial-error")`)
    /// and schedules the idle decay.
    pub async fn dial(&self, target: &str) -> Result<()> {
        if *self.registration.borrow() != RegistrationState::Registered {
            self.report_error("Not registered. Cannot make call.");
            return Err(Error::NotRegistered);
        }
        if self.current.read().await.is_some() {
            self.report_error("Another call is active.");
            return Err(Error::CallInProgress);
        }

        let (server, input_device) = {
            let s = self.settings.read().await;
            (s.sip_server.clone(), s.audio_input_device_id.clone())
        };
        let target_uri = format!("sip:{target}@{server}");
        let media = MediaOptions::audio_only(input_device);

        info!(%target_uri, "dialing");
        match self.transport.call(&target_uri, &media).await {
            Ok(_session) => Ok(()),
            Err(e) => {
                warn!(error = %e, "call initiation failed");
                self.set_state(CallState::failed("dial-error"), None).await;
                self.schedule_decay();
                self.report_error(&format!("Call failed: {e}"));
                Err(Error::Transport {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Answer the ringing inbound call.
    ///
    /// Valid only in `Incoming`. The state stays `Incoming` until the
    /// transport confirms with `SessionAccepted`/`SessionConfirmed`.
    pub async fn answer(&self) -> Result<()> {
        let Some(session) = self.current.read().await.clone() else {
            self.report_error("No incoming call to answer.");
            return Err(Error::NoActiveCall);
        };
        let state = self.state().await;
        if state != CallState::Incoming {
            return Err(Error::InvalidCallState {
                expected: "Incoming",
                actual: state.to_string(),
            });
        }

        let input_device = self.settings.read().await.audio_input_device_id.clone();
        let media = MediaOptions::audio_only(input_device);

        info!(session = %session.id, "answering");
        self.transport
            .answer(&session.id, &media)
            .await
            .map_err(|e| Error::Transport {
                message: e.to_string(),
            })
    }

    /// Hang up the current call.
    ///
    /// The termination reason depends on the state: a ringing inbound call is
    /// declined, an unanswered outbound attempt cancelled, anything else torn
    /// down normally. The session slot is cleared by the transport's
    /// ended/failed event — except when the terminate request itself fails,
    /// where the controller forces `Failed("hangup-error")` and clears the
    /// slot immediately so the machine cannot wedge.
    pub async fn hang_up(&self) -> Result<()> {
        let Some(session) = self.current.read().await.clone() else {
            self.report_error("No active call to hangup.");
            return Err(Error::NoActiveCall);
        };

        let reason = match self.state().await {
            CallState::Incoming => TerminateReason::Decline,
            CallState::Calling => TerminateReason::Cancel,
            _ => TerminateReason::Bye,
        };

        info!(session = %session.id, ?reason, "hanging up");
        match self.transport.terminate(&session.id, reason).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "terminate failed, forcing call teardown");
                *self.current.write().await = None;
                self.set_state(CallState::failed("hangup-error"), None).await;
                self.schedule_decay();
                self.report_error(&format!("Hangup failed: {e}"));
                Err(Error::Transport {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Request microphone mute/unmute. The mute status event follows from
    /// the transport, never from this call.
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        let session = self.require_session().await?;
        self.transport
            .set_muted(&session.id, muted)
            .await
            .map_err(|e| Error::Transport {
                message: e.to_string(),
            })
    }

    /// Request hold; `Held` is entered on the transport's hold event.
    pub async fn hold(&self) -> Result<()> {
        let session = self.require_session().await?;
        self.transport
            .hold(&session.id)
            .await
            .map_err(|e| Error::Transport {
                message: e.to_string(),
            })
    }

    /// Request resume; `Active` is entered on the transport's unhold event.
    pub async fn resume(&self) -> Result<()> {
        let session = self.require_session().await?;
        self.transport
            .resume(&session.id)
            .await
            .map_err(|e| Error::Transport {
                message: e.to_string(),
            })
    }

    /// Drop any session reference and settle at `Idle`. Used when the
    /// registration stops — a call cannot outlive it.
    pub(crate) async fn reset_to_idle(&self) {
        *self.current.write().await = None;
        self.set_state(CallState::Idle, None).await;
    }

    // ── Event handling ───────────────────────────────────────────────

    /// React to a transport session event. Runs on the single dispatch task,
    /// which makes this the only writer of the session slot.
    pub(crate) async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::NewSession {
                session,
                origin,
                remote,
            } => self.on_new_session(session, origin, remote).await,
            TransportEvent::SessionAccepted { session }
            | TransportEvent::SessionConfirmed { session } => {
                if self.is_current(&session).await {
                    self.set_state(CallState::Active, None).await;
                }
            }
            TransportEvent::SessionHeld {
                session,
                originator,
            } => {
                if self.is_current(&session).await {
                    let state = match originator {
                        Originator::Local => CallState::Held,
                        Originator::Remote => CallState::RemoteHeld,
                    };
                    self.set_state(state, None).await;
                }
            }
            TransportEvent::SessionResumed { session } => {
                if self.is_current(&session).await {
                    self.set_state(CallState::Active, None).await;
                }
            }
            TransportEvent::SessionMuted { session, muted } => {
                if self.is_current(&session).await {
                    let _ = self.events.send(PhoneEvent::MuteStatusChanged { muted });
                }
            }
            TransportEvent::SessionEnded { session, cause } => {
                self.on_session_over(session, CallState::ended(cause)).await;
            }
            TransportEvent::SessionFailed { session, cause } => {
                self.on_session_over(session, CallState::failed(cause)).await;
            }
            other => debug!(?other, "ignoring non-session event"),
        }
    }

    async fn on_new_session(&self, id: SessionId, origin: Originator, remote: String) {
        let mut slot = self.current.write().await;
        if slot.is_some() {
            warn!(session = %id, %remote, "session arrived while another is active, refusing");
            drop(slot);
            if let Err(e) = self.transport.terminate(&id, TerminateReason::Busy).await {
                warn!(error = %e, "failed to refuse concurrent session");
            }
            return;
        }

        let direction = match origin {
            Originator::Remote => CallDirection::Incoming,
            Originator::Local => CallDirection::Outgoing,
        };
        *slot = Some(CallSession {
            id,
            direction,
            remote: remote.clone(),
        });
        drop(slot);

        match origin {
            Originator::Remote => {
                info!(session = %id, caller = %remote, "incoming call");
                self.set_state(CallState::Incoming, Some(remote)).await;
            }
            Originator::Local => {
                self.set_state(CallState::Calling, None).await;
            }
        }
    }

    async fn on_session_over(&self, id: SessionId, terminal: CallState) {
        if !self.is_current(&id).await {
            debug!(session = %id, "end event for a session we do not own");
            return;
        }
        *self.current.write().await = None;
        self.set_state(terminal, None).await;
        self.schedule_decay();
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn require_session(&self) -> Result<CallSession> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(Error::NoActiveCall)
    }

    async fn is_current(&self, id: &SessionId) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .map(|s| &s.id == id)
            .unwrap_or(false)
    }

    /// Equality-suppressed state change + broadcast.
    async fn set_state(&self, new: CallState, caller: Option<String>) {
        let mut state = self.state.write().await;
        if *state == new {
            return;
        }
        info!(from = %*state, to = %new, "call state changed");
        *state = new.clone();
        drop(state);

        self.decay_generation.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .events
            .send(PhoneEvent::CallStateChanged { state: new, caller });
    }

    /// Arrange the terminal-state reset to `Idle` after [`IDLE_DECAY`].
    fn schedule_decay(&self) {
        let generation = self.decay_generation.load(Ordering::SeqCst);
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(IDLE_DECAY).await;
            if this.decay_generation.load(Ordering::SeqCst) == generation {
                this.set_state(CallState::Idle, None).await;
            } else {
                debug!("idle decay cancelled by a newer state change");
            }
        });
    }

    fn report_error(&self, message: &str) {
        let _ = self.events.send(PhoneEvent::Error {
            message: message.to_string(),
        });
    }
}
