//! Typed configuration record and its TOML-backed store.
//!
//! Field names serialize camelCase because the record crosses the UI
//! boundary verbatim (`getConfig`/`saveConfig`). On disk the same names are
//! used in TOML.

use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings record ─────────────────────────────────────────────────

/// Signaling socket scheme used to reach the SIP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SipTransport {
    /// Secure WebSocket (default).
    #[default]
    Wss,
    /// Plain WebSocket.
    Ws,
}

impl SipTransport {
    /// URI scheme for this transport.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Wss => "wss",
            Self::Ws => "ws",
        }
    }

    /// Port used when the configuration does not pin one.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Wss => 443,
            Self::Ws => 80,
        }
    }
}

impl fmt::Display for SipTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// The persisted configuration record.
///
/// Holds identifiers and preferences only. Credential secrets (the SIP
/// password, the platform API key secret) live in the [`crate::SecretVault`];
/// there is deliberately no field here that could carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // Signaling server
    pub sip_server: String,
    pub sip_port: Option<u16>,
    pub sip_username: String,
    pub sip_display_name: String,
    pub sip_transport: SipTransport,

    // Calling-platform account
    pub account_sid: String,
    pub api_key_sid: String,
    /// URL of the serverless function that handles platform voice callbacks.
    pub function_url: String,
    /// Managed voice application SID (auto-provisioned, never hand-edited).
    pub twiml_app_sid: String,
    /// Canonical string of the selected number (e.g. "+15551234567").
    pub selected_phone_number: String,
    /// SID of the selected number ("PN...").
    pub selected_phone_number_sid: String,

    // Device preferences
    pub audio_input_device_id: String,
    pub audio_output_device_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sip_server: String::new(),
            sip_port: None,
            sip_username: String::new(),
            sip_display_name: String::new(),
            sip_transport: SipTransport::Wss,
            account_sid: String::new(),
            api_key_sid: String::new(),
            function_url: String::new(),
            twiml_app_sid: String::new(),
            selected_phone_number: String::new(),
            selected_phone_number_sid: String::new(),
            audio_input_device_id: "default".into(),
            audio_output_device_id: "default".into(),
        }
    }
}

impl Settings {
    /// True iff the platform credentials and callback URL are all configured.
    ///
    /// The API key secret is implied by `api_key_sid` — it lives in the vault.
    pub fn credentials_configured(&self) -> bool {
        !self.account_sid.is_empty()
            && !self.api_key_sid.is_empty()
            && !self.function_url.is_empty()
    }

    /// True iff access-token issuance has everything it needs
    /// (the secret itself is fetched from the vault at issue time).
    pub fn ready_for_token(&self) -> bool {
        !self.account_sid.is_empty()
            && !self.api_key_sid.is_empty()
            && !self.twiml_app_sid.is_empty()
    }

    /// Comparable view of the fields that force a registration restart
    /// when they change.
    pub fn connection_fields(&self) -> (String, Option<u16>, String, String, SipTransport) {
        (
            self.sip_server.clone(),
            self.sip_port,
            self.sip_username.clone(),
            self.sip_display_name.clone(),
            self.sip_transport,
        )
    }
}

// ── Partial update ──────────────────────────────────────────────────

/// Partial configuration update: every field optional.
///
/// Deserializes from the UI boundary's partial save payloads; [`apply`]
/// merges only the fields that are present.
///
/// [`apply`]: SettingsPatch::apply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub sip_server: Option<String>,
    pub sip_port: Option<Option<u16>>,
    pub sip_username: Option<String>,
    pub sip_display_name: Option<String>,
    pub sip_transport: Option<SipTransport>,
    pub account_sid: Option<String>,
    pub api_key_sid: Option<String>,
    pub function_url: Option<String>,
    pub twiml_app_sid: Option<String>,
    pub selected_phone_number: Option<String>,
    pub selected_phone_number_sid: Option<String>,
    pub audio_input_device_id: Option<String>,
    pub audio_output_device_id: Option<String>,
}

impl SettingsPatch {
    /// Merge the present fields into `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field.clone() {
                    settings.$field = value;
                })*
            };
        }
        merge!(
            sip_server,
            sip_port,
            sip_username,
            sip_display_name,
            sip_transport,
            account_sid,
            api_key_sid,
            function_url,
            twiml_app_sid,
            selected_phone_number,
            selected_phone_number_sid,
            audio_input_device_id,
            audio_output_device_id,
        );
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// TOML-backed store for the [`Settings`] record.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Open the store at the platform configuration path.
    pub fn open() -> Self {
        Self {
            path: default_path(),
        }
    }

    /// Open the store at an explicit path (tests, embedding).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, merging the file over defaults.
    ///
    /// A missing file yields pure defaults; a partial file is filled in so
    /// every known key exists afterwards.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&self.path))
            .extract()?;
        debug!(path = %self.path.display(), "settings loaded");
        Ok(settings)
    }

    /// Load, falling back to defaults when the file is unreadable.
    pub fn load_or_default(&self) -> Settings {
        self.load().unwrap_or_default()
    }

    /// Persist the record as pretty TOML, creating parent directories.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, toml_str)?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Load, apply a partial update, save, and return the merged record.
    pub fn update(&self, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        patch.apply(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

/// Resolve the config file path via XDG / platform conventions.
fn default_path() -> PathBuf {
    ProjectDirs::from("com", "dialtone", "dialtone").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("dialtone");
            p.push("settings.toml");
            p
        },
        |dirs| dirs.config_dir().join("settings.toml"),
    )
}

// ── Tests ───────────────────────────────────────────────────────────
