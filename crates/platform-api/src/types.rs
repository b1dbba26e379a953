//! Wire types for the calling-platform REST API.
//!
//! Responses arrive as snake_case JSON; write operations are form-encoded
//! with PascalCase parameter names. Both shapes are captured here so the
//! client stays free of stringly-typed payload assembly.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ── Credentials ─────────────────────────────────────────────────────

/// API key credentials for one platform account.
///
/// Deserializes from the UI boundary; deliberately not `Serialize` — the
/// secret never travels back out of the process, and the persisted
/// configuration record has no field for it.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCredentials {
    pub account_sid: String,
    pub api_key_sid: String,
    pub api_key_secret: SecretString,
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("account_sid", &self.account_sid)
            .field("api_key_sid", &self.api_key_sid)
            .field("api_key_secret", &"<redacted>")
            .finish()
    }
}

// ── Phone numbers ───────────────────────────────────────────────────

/// An incoming phone number resource.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingPhoneNumber {
    pub sid: String,
    pub phone_number: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub voice_url: Option<String>,
    #[serde(default)]
    pub voice_method: Option<String>,
    #[serde(default)]
    pub voice_application_sid: Option<String>,
}

/// Page envelope for number listings.
#[derive(Debug, Deserialize)]
pub(crate) struct IncomingPhoneNumberPage {
    pub incoming_phone_numbers: Vec<IncomingPhoneNumber>,
}

/// Form parameters for updating a number's voice routing.
///
/// `voice_url: Some("")` explicitly clears a legacy direct-webhook URL so the
/// application binding is the only route.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NumberUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_application_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_callback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_callback_method: Option<String>,
}

// ── Voice applications ──────────────────────────────────────────────

/// A voice application resource mapping calls to a webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceApplication {
    pub sid: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub voice_url: Option<String>,
    #[serde(default)]
    pub voice_method: Option<String>,
}

/// Page envelope for application listings.
#[derive(Debug, Deserialize)]
pub(crate) struct VoiceApplicationPage {
    pub applications: Vec<VoiceApplication>,
}

/// Form parameters for creating or updating a voice application.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_method: Option<String>,
}

// ── Error body ──────────────────────────────────────────────────────

/// Error response shape from the platform.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<u32>,
}
