//! Voice access-token issuance.
//!
//! Produces the platform's short-lived signed credential: an HS256 JWS whose
//! grants authorize one client identity to place calls through a voice
//! application and to receive inbound calls. The token is opaque to the rest
//! of the system — it is handed to the media/signaling client verbatim.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Fixed token lifetime: one hour.
pub const VOICE_TOKEN_TTL_SECS: u64 = 3600;

/// Token content type expected by the platform.
const TOKEN_CTY: &str = "twilio-fpa;v=1";

/// Signs voice access tokens for one (account, API key) pair.
pub struct VoiceTokenSigner {
    account_sid: String,
    api_key_sid: String,
    api_key_secret: SecretString,
}

/// Claims of a voice access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub grants: Grants,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Grants {
    pub identity: String,
    pub voice: VoiceGrant,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceGrant {
    pub outgoing: OutgoingGrant,
    pub incoming: IncomingGrant,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingGrant {
    pub application_sid: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncomingGrant {
    pub allow: bool,
}

impl VoiceTokenSigner {
    pub fn new(
        account_sid: impl Into<String>,
        api_key_sid: impl Into<String>,
        api_key_secret: SecretString,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            api_key_sid: api_key_sid.into(),
            api_key_secret,
        }
    }

    /// Issue a token granting `identity` voice access through `application_sid`.
    pub fn issue(&self, identity: &str, application_sid: &str) -> Result<String, Error> {
        let now = chrono::Utc::now().timestamp() as u64;

        let claims = VoiceClaims {
            jti: format!("{}-{}", self.api_key_sid, Uuid::new_v4().simple()),
            iss: self.api_key_sid.clone(),
            sub: self.account_sid.clone(),
            iat: now,
            exp: now + VOICE_TOKEN_TTL_SECS,
            grants: Grants {
                identity: identity.to_string(),
                voice: VoiceGrant {
                    outgoing: OutgoingGrant {
                        application_sid: application_sid.to_string(),
                    },
                    incoming: IncomingGrant { allow: true },
                },
            },
        };

        let mut header = Header::new(Algorithm::HS256);
        header.cty = Some(TOKEN_CTY.to_string());
        header.kid = Some(self.api_key_sid.clone());

        let key = EncodingKey::from_secret(self.api_key_secret.expose_secret().as_bytes());
        Ok(encode(&header, &claims, &key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn signer() -> VoiceTokenSigner {
        VoiceTokenSigner::new("AC123", "SK456", SecretString::from("topsecret".to_string()))
    }

    #[test]
    fn issued_token_carries_voice_grants() {
        let token = signer().issue("alice", "AP789").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<VoiceClaims>(
            &token,
            &DecodingKey::from_secret(b"topsecret"),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims.iss, "SK456");
        assert_eq!(data.claims.sub, "AC123");
        assert_eq!(data.claims.grants.identity, "alice");
        assert_eq!(data.claims.grants.voice.outgoing.application_sid, "AP789");
        assert!(data.claims.grants.voice.incoming.allow);
        assert_eq!(data.claims.exp - data.claims.iat, VOICE_TOKEN_TTL_SECS);
    }

    #[test]
    fn header_names_the_signing_key() {
        let token = signer().issue("bob", "AP1").unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();

        assert_eq!(header.kid.as_deref(), Some("SK456"));
        assert_eq!(header.cty.as_deref(), Some("twilio-fpa;v=1"));
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn jti_is_unique_per_issue() {
        let s = signer();
        let a = s.issue("alice", "AP1").unwrap();
        let b = s.issue("alice", "AP1").unwrap();
        assert_ne!(a, b);
    }
}
