//! Typed async façade over the calling-platform REST API.
//!
//! Three resource types are covered — incoming phone numbers, voice
//! applications, and access tokens:
//!
//! - [`PlatformClient`] — list/fetch/update numbers, list/create/update
//!   applications. JSON responses, form-encoded writes, HTTP basic auth with
//!   an API key pair.
//! - [`VoiceTokenSigner`] — short-lived signed credentials that let a client
//!   identity place and receive calls through a voice application.
//!
//! The higher-level provisioning workflow (find-or-create, number binding)
//! lives in `dialtone-phone-core`; this crate stays a thin wire layer.

pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::{PlatformClient, DEFAULT_BASE_URL};
pub use error::Error;
pub use token::{VoiceTokenSigner, VOICE_TOKEN_TTL_SECS};
pub use types::{
    ApplicationParams, IncomingPhoneNumber, NumberUpdate, PlatformCredentials, VoiceApplication,
};
