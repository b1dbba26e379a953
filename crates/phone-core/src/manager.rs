//! Top-level session manager: explicit context object owning the
//! configuration, both controllers, and the provisioning orchestrator.
//!
//! This is the command surface the UI boundary calls. Every method returns a
//! structured outcome (`Result` with a displayable error); progress beyond
//! the invocation is reported through the broadcast channel from
//! [`subscribe`](SessionManager::subscribe).

use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};
use tracing::info;

use dialtone_platform_api::{PlatformCredentials, DEFAULT_BASE_URL};
use dialtone_settings_core::{SecretVault, Settings, SettingsPatch, SettingsStore};

use crate::call::CallState;
use crate::error::Result;
use crate::events::{PhoneEvent, EVENT_CHANNEL_CAPACITY};
use crate::provisioning::{ActivationRequest, PhoneNumberSummary, ProvisioningOrchestrator};
use crate::registration::{RegistrationController, RegistrationState};
use crate::session::SessionController;
use crate::transport::SignalingTransport;

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    store: SettingsStore,
    vault: Arc<dyn SecretVault>,
    transport: Arc<dyn SignalingTransport>,
    platform_base_url: String,
}

impl SessionManagerBuilder {
    pub fn new(
        store: SettingsStore,
        vault: Arc<dyn SecretVault>,
        transport: Arc<dyn SignalingTransport>,
    ) -> Self {
        Self {
            store,
            vault,
            transport,
            platform_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the platform client at a different API root (tests, regions).
    pub fn platform_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.platform_base_url = base_url.into();
        self
    }

    /// Load configuration and wire the controllers together.
    pub fn build(self) -> Result<SessionManager> {
        let settings = Arc::new(RwLock::new(self.store.load()?));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(RegistrationState::Unregistered);

        let session = SessionController::new(
            self.transport.clone(),
            settings.clone(),
            state_rx,
            event_tx.clone(),
        );
        let registration = RegistrationController::new(
            self.transport,
            settings.clone(),
            self.vault.clone(),
            session.clone(),
            state_tx,
            event_tx.clone(),
        );
        let provisioning = ProvisioningOrchestrator::new(
            settings.clone(),
            self.store.clone(),
            self.vault,
            event_tx.clone(),
            self.platform_base_url,
        );

        Ok(SessionManager {
            settings,
            store: self.store,
            registration,
            session,
            provisioning,
            events: event_tx,
        })
    }
}

/// The softphone core: one registration, one call, one configuration.
pub struct SessionManager {
    settings: Arc<RwLock<Settings>>,
    store: SettingsStore,
    registration: RegistrationController,
    session: SessionController,
    provisioning: ProvisioningOrchestrator,
    events: broadcast::Sender<PhoneEvent>,
}

impl SessionManager {
    pub fn builder(
        store: SettingsStore,
        vault: Arc<dyn SecretVault>,
        transport: Arc<dyn SignalingTransport>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder::new(store, vault, transport)
    }

    /// Subscribe to all state-change broadcasts.
    pub fn subscribe(&self) -> broadcast::Receiver<PhoneEvent> {
        self.events.subscribe()
    }

    // ── Registration ─────────────────────────────────────────────────

    pub fn registration_status(&self) -> RegistrationState {
        self.registration.state()
    }

    /// Connect and register with the configured signaling server.
    pub async fn start_registration(&self) -> Result<()> {
        self.registration.start().await
    }

    /// Unregister and stop the transport; resets the call state.
    pub async fn stop_registration(&self) {
        self.registration.stop().await;
    }

    // ── Calls ────────────────────────────────────────────────────────

    pub async fn call_state(&self) -> CallState {
        self.session.state().await
    }

    /// Place an outgoing call to a dial string.
    pub async fn start_call(&self, target: &str) -> Result<()> {
        self.session.dial(target).await
    }

    /// Answer the ringing inbound call.
    pub async fn answer_call(&self) -> Result<()> {
        self.session.answer().await
    }

    /// Hang up, decline, or cancel the current call depending on its state.
    pub async fn hang_up_call(&self) -> Result<()> {
        self.session.hang_up().await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.session.set_muted(muted).await
    }

    pub async fn hold_call(&self) -> Result<()> {
        self.session.hold().await
    }

    pub async fn resume_call(&self) -> Result<()> {
        self.session.resume().await
    }

    // ── Provisioning ─────────────────────────────────────────────────

    /// True iff platform credentials and the function URL are configured.
    pub async fn credentials_status(&self) -> bool {
        self.settings.read().await.credentials_configured()
    }

    /// Issue a voice access token for `identity`.
    pub async fn access_token(&self, identity: &str) -> Result<String> {
        self.provisioning.issue_token(identity).await
    }

    /// List the account's phone numbers, optionally with temporary
    /// credentials.
    pub async fn list_phone_numbers(
        &self,
        temp_credentials: Option<PlatformCredentials>,
    ) -> Result<Vec<PhoneNumberSummary>> {
        self.provisioning.list_numbers(temp_credentials).await
    }

    /// Run the activation workflow (store secret, configure the remote
    /// account, persist the results).
    pub async fn activate_account(&self, request: ActivationRequest) -> Result<()> {
        self.provisioning.activate(request).await
    }

    // ── Configuration ────────────────────────────────────────────────

    /// The current configuration record (safe by construction — the type
    /// carries no secret field).
    pub async fn config(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Merge a partial update, persist it, broadcast the change, and restart
    /// the registration when connection-relevant fields changed.
    pub async fn save_config(&self, patch: SettingsPatch) -> Result<()> {
        let (connection_changed, credentials_changed, snapshot) = {
            let mut settings = self.settings.write().await;
            let connection_before = settings.connection_fields();
            let credentials_before =
                (settings.account_sid.clone(), settings.api_key_sid.clone());

            patch.apply(&mut settings);
            self.store.save(&settings)?;

            (
                connection_before != settings.connection_fields(),
                credentials_before
                    != (settings.account_sid.clone(), settings.api_key_sid.clone()),
                settings.clone(),
            )
        };

        if credentials_changed {
            self.provisioning.invalidate_client().await;
        }

        let _ = self
            .events
            .send(PhoneEvent::ConfigurationUpdated { settings: snapshot });

        if connection_changed {
            info!("connection settings changed, restarting registration");
            self.registration.stop().await;
            self.registration.start().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("registration", &self.registration.state())
            .finish()
    }
}
