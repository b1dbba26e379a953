//! Account activation and platform-side resource management.
//!
//! [`ProvisioningOrchestrator`] runs the multi-step "activate account"
//! workflow: store the secret, persist the safe configuration subset, resolve
//! a REST client, fetch the selected number, find-or-create the managed voice
//! application, and bind the number to it. Each step persists its own result
//! before the next begins, so a failure at step *n* leaves steps *1..n*
//! durable and the workflow safe to re-run — the remote steps are idempotent
//! (find-before-create, update-if-different) and converge without creating
//! duplicate resources.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use dialtone_platform_api::{
    ApplicationParams, NumberUpdate, PlatformClient, PlatformCredentials, VoiceTokenSigner,
};
use dialtone_settings_core::{SecretVault, Settings, SettingsStore};

use crate::error::{Error, ProvisioningStep, Result};
use crate::events::PhoneEvent;

/// Friendly name of the auto-managed voice application.
pub const MANAGED_APP_NAME: &str = "Dialtone Auto App";

/// Callback HTTP method configured on the application and number.
const VOICE_METHOD: &str = "POST";

/// Input to [`ProvisioningOrchestrator::activate`].
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    pub credentials: PlatformCredentials,
    /// URL of the function endpoint that handles voice callbacks.
    pub function_url: String,
    /// SID of the phone number to route ("PN...").
    pub number_sid: String,
    #[serde(default)]
    pub audio_input_device_id: Option<String>,
    #[serde(default)]
    pub audio_output_device_id: Option<String>,
}

/// One listed phone number, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberSummary {
    pub number: String,
    pub sid: String,
}

/// Runs the provisioning workflow and issues access tokens.
pub struct ProvisioningOrchestrator {
    settings: Arc<RwLock<Settings>>,
    store: SettingsStore,
    vault: Arc<dyn SecretVault>,
    events: tokio::sync::broadcast::Sender<PhoneEvent>,
    /// Lazily built from stored credentials; dropped when they change.
    client: RwLock<Option<Arc<PlatformClient>>>,
    base_url: String,
}

impl ProvisioningOrchestrator {
    pub(crate) fn new(
        settings: Arc<RwLock<Settings>>,
        store: SettingsStore,
        vault: Arc<dyn SecretVault>,
        events: tokio::sync::broadcast::Sender<PhoneEvent>,
        base_url: String,
    ) -> Self {
        Self {
            settings,
            store,
            vault,
            events,
            client: RwLock::new(None),
            base_url,
        }
    }

    // ── Activation workflow ──────────────────────────────────────────

    /// Bring the remote account to the state where `number_sid` routes calls
    /// to `function_url` via the managed application, persisting the minimal
    /// non-secret configuration along the way.
    pub async fn activate(&self, request: ActivationRequest) -> Result<()> {
        // 1. Validate before touching anything.
        let mut missing = Vec::new();
        if request.credentials.account_sid.is_empty() {
            missing.push("accountSid");
        }
        if request.credentials.api_key_sid.is_empty() {
            missing.push("apiKeySid");
        }
        if request.credentials.api_key_secret.expose_secret().is_empty() {
            missing.push("apiKeySecret");
        }
        if request.function_url.is_empty() {
            missing.push("functionUrl");
        }
        if request.number_sid.is_empty() {
            missing.push("numberSid");
        }
        if !missing.is_empty() {
            return Err(Error::Configuration {
                message: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        // 2. Secret first; nothing remote has been touched yet.
        self.vault.store(
            &request.credentials.api_key_sid,
            &request.credentials.api_key_secret,
        )?;
        debug!(account = %request.credentials.api_key_sid, "API key secret stored");

        // 3. Safe configuration subset, so step 2 is resumable.
        self.persist(|s| {
            s.account_sid = request.credentials.account_sid.clone();
            s.api_key_sid = request.credentials.api_key_sid.clone();
            s.function_url = request.function_url.clone();
            s.selected_phone_number_sid = request.number_sid.clone();
            if let Some(ref device) = request.audio_input_device_id {
                s.audio_input_device_id = device.clone();
            }
            if let Some(ref device) = request.audio_output_device_id {
                s.audio_output_device_id = device.clone();
            }
        })
        .await?;

        // 4. Fresh client from the credentials in hand.
        let client = Arc::new(
            PlatformClient::with_base_url(&request.credentials, &self.base_url).map_err(|e| {
                Error::Configuration {
                    message: format!("failed to initialise platform client: {e}"),
                }
            })?,
        );
        *self.client.write().await = Some(client.clone());

        // 5. Resolve the number's canonical string.
        let number = client
            .fetch_incoming_number(&request.number_sid)
            .await
            .map_err(|e| provisioning_error(ProvisioningStep::NumberFetch, &e))?;
        if number.phone_number.is_empty() {
            return Err(Error::Provisioning {
                step: ProvisioningStep::NumberFetch,
                message: "number details did not contain a phone number string".into(),
            });
        }
        self.persist(|s| s.selected_phone_number = number.phone_number.clone())
            .await?;
        info!(number = %number.phone_number, "selected number resolved");

        // 6. Find or create the managed application; update if it drifted.
        let app_sid = self
            .find_or_create_application(&client, &request.function_url)
            .await?;
        self.persist(|s| s.twiml_app_sid = app_sid.clone()).await?;
        info!(app = %app_sid, "managed voice application ready");

        // 7. Bind the number to the application and clear any legacy webhook.
        client
            .update_incoming_number(
                &request.number_sid,
                &NumberUpdate {
                    voice_application_sid: Some(app_sid.clone()),
                    voice_url: Some(String::new()),
                    voice_method: Some(VOICE_METHOD.into()),
                    status_callback: Some(String::new()),
                    status_callback_method: Some(VOICE_METHOD.into()),
                },
            )
            .await
            .map_err(|e| provisioning_error(ProvisioningStep::NumberBinding, &e))?;
        info!(number = %number.phone_number, app = %app_sid, "number bound to application");

        // 8. Publish the final configuration.
        let settings = self.settings.read().await.clone();
        let _ = self
            .events
            .send(PhoneEvent::ConfigurationUpdated { settings });
        Ok(())
    }

    async fn find_or_create_application(
        &self,
        client: &PlatformClient,
        function_url: &str,
    ) -> Result<String> {
        let apps = client
            .list_applications_named(MANAGED_APP_NAME)
            .await
            .map_err(|e| provisioning_error(ProvisioningStep::Application, &e))?;

        match apps.into_iter().next() {
            Some(app) => {
                if app.voice_url.as_deref() != Some(function_url)
                    || app.voice_method.as_deref() != Some(VOICE_METHOD)
                {
                    debug!(app = %app.sid, "application callback drifted, updating");
                    client
                        .update_application(
                            &app.sid,
                            &ApplicationParams {
                                friendly_name: None,
                                voice_url: Some(function_url.to_string()),
                                voice_method: Some(VOICE_METHOD.into()),
                            },
                        )
                        .await
                        .map_err(|e| provisioning_error(ProvisioningStep::Application, &e))?;
                }
                Ok(app.sid)
            }
            None => {
                debug!("no managed application found, creating one");
                let app = client
                    .create_application(&ApplicationParams {
                        friendly_name: Some(MANAGED_APP_NAME.into()),
                        voice_url: Some(function_url.to_string()),
                        voice_method: Some(VOICE_METHOD.into()),
                    })
                    .await
                    .map_err(|e| provisioning_error(ProvisioningStep::Application, &e))?;
                Ok(app.sid)
            }
        }
    }

    // ── Tokens ───────────────────────────────────────────────────────

    /// Issue a voice access token for `identity`.
    ///
    /// Requires the account SID, API key SID, and application SID in
    /// configuration; the signing secret comes from the vault.
    pub async fn issue_token(&self, identity: &str) -> Result<String> {
        if identity.is_empty() {
            return Err(Error::Configuration {
                message: "token identity is required".into(),
            });
        }

        let (account_sid, api_key_sid, app_sid) = {
            let s = self.settings.read().await;
            if !s.ready_for_token() {
                return Err(Error::Configuration {
                    message:
                        "token issuance requires accountSid, apiKeySid, and twimlAppSid".into(),
                });
            }
            (
                s.account_sid.clone(),
                s.api_key_sid.clone(),
                s.twiml_app_sid.clone(),
            )
        };

        let secret = self.vault.retrieve(&api_key_sid)?;
        let signer = VoiceTokenSigner::new(account_sid, api_key_sid, secret);
        let token = signer.issue(identity, &app_sid)?;
        debug!(%identity, "access token issued");
        Ok(token)
    }

    // ── Listing ──────────────────────────────────────────────────────

    /// List the account's phone numbers, optionally with temporary
    /// credentials (pre-activation UI flow).
    pub async fn list_numbers(
        &self,
        temp_credentials: Option<PlatformCredentials>,
    ) -> Result<Vec<PhoneNumberSummary>> {
        let client = match temp_credentials {
            Some(credentials) => Arc::new(
                PlatformClient::with_base_url(&credentials, &self.base_url).map_err(|e| {
                    Error::Configuration {
                        message: format!("failed to initialise platform client: {e}"),
                    }
                })?,
            ),
            None => self.ensure_client().await?,
        };

        let numbers = client.list_incoming_numbers(100).await?;
        debug!(count = numbers.len(), "phone numbers listed");
        Ok(numbers
            .into_iter()
            .map(|n| PhoneNumberSummary {
                number: n.phone_number,
                sid: n.sid,
            })
            .collect())
    }

    // ── Client cache ─────────────────────────────────────────────────

    /// Drop the cached client; called when stored credentials change.
    pub(crate) async fn invalidate_client(&self) {
        if self.client.write().await.take().is_some() {
            debug!("platform client cache invalidated");
        }
    }

    /// Cached client, or one rebuilt from stored identifiers + vault secret.
    async fn ensure_client(&self) -> Result<Arc<PlatformClient>> {
        if let Some(client) = self.client.read().await.clone() {
            return Ok(client);
        }

        let (account_sid, api_key_sid) = {
            let s = self.settings.read().await;
            (s.account_sid.clone(), s.api_key_sid.clone())
        };
        if account_sid.is_empty() || api_key_sid.is_empty() {
            return Err(Error::Configuration {
                message: "platform client requires accountSid and apiKeySid".into(),
            });
        }

        let api_key_secret = self.vault.retrieve(&api_key_sid).map_err(|e| {
            warn!(error = %e, "API key secret unavailable");
            e
        })?;

        let credentials = PlatformCredentials {
            account_sid,
            api_key_sid,
            api_key_secret,
        };
        let client = Arc::new(
            PlatformClient::with_base_url(&credentials, &self.base_url).map_err(|e| {
                Error::Configuration {
                    message: format!("failed to initialise platform client: {e}"),
                }
            })?,
        );
        *self.client.write().await = Some(client.clone());
        Ok(client)
    }

    // ── Persistence helper ───────────────────────────────────────────

    /// Mutate the live settings and write them through to disk.
    async fn persist(&self, mutate: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut settings = self.settings.write().await;
        mutate(&mut settings);
        self.store.save(&settings)?;
        Ok(())
    }
}

fn provisioning_error(step: ProvisioningStep, source: &dialtone_platform_api::Error) -> Error {
    Error::Provisioning {
        step,
        message: source.to_string(),
    }
}
