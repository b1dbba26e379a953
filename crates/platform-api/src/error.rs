use thiserror::Error;

/// Top-level error type for the `dialtone-platform-api` crate.
///
/// `dialtone-phone-core` maps these into user-facing diagnostics; the
/// 401-class case is kept distinct so callers can surface a credentials
/// message instead of a generic API failure.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The platform rejected the API key pair (401-class response).
    #[error("authentication failed -- check the account SID and API key/secret")]
    Authentication,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Structured error returned by the platform.
    #[error("platform API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<u32>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Tokens ──────────────────────────────────────────────────────
    /// Access-token signing failed.
    #[error("token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl Error {
    /// Returns `true` for 401-class failures where fixing credentials
    /// might resolve the problem.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Authentication => true,
            Self::Api { status: 401, .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }

    /// Returns `true` if the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status: 404, .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}
