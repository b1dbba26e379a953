// Hand-crafted async HTTP client for the calling-platform REST API.
//
// Base path: /2010-04-01/Accounts/{AccountSid}/
// Auth: HTTP basic with (API key SID, API key secret)

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::types::{
    ApplicationParams, ErrorBody, IncomingPhoneNumber, IncomingPhoneNumberPage, NumberUpdate,
    PlatformCredentials, VoiceApplication, VoiceApplicationPage,
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.twilio.com/2010-04-01/";

/// Async client for the calling-platform REST API, scoped to one account.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Url,
    account_sid: String,
    api_key_sid: String,
    api_key_secret: SecretString,
}

impl PlatformClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client against the production API root.
    pub fn new(credentials: &PlatformCredentials) -> Result<Self, Error> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL)
    }

    /// Build a client against an explicit API root (tests, regional hosts).
    pub fn with_base_url(credentials: &PlatformCredentials, base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("dialtone/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            account_sid: credentials.account_sid.clone(),
            api_key_sid: credentials.api_key_sid.clone(),
            api_key_secret: credentials.api_key_secret.clone(),
        })
    }

    /// The account this client is scoped to.
    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }

    // ── Phone numbers ────────────────────────────────────────────────

    /// List the account's incoming phone numbers (single page, up to `limit`).
    pub async fn list_incoming_numbers(
        &self,
        limit: u32,
    ) -> Result<Vec<IncomingPhoneNumber>, Error> {
        let page: IncomingPhoneNumberPage = self
            .get_with_params(
                "IncomingPhoneNumbers.json",
                &[("PageSize", limit.to_string())],
            )
            .await?;
        Ok(page.incoming_phone_numbers)
    }

    /// Fetch one incoming phone number by SID.
    pub async fn fetch_incoming_number(
        &self,
        number_sid: &str,
    ) -> Result<IncomingPhoneNumber, Error> {
        self.get(&format!("IncomingPhoneNumbers/{number_sid}.json"))
            .await
    }

    /// Update a number's voice routing.
    pub async fn update_incoming_number(
        &self,
        number_sid: &str,
        update: &NumberUpdate,
    ) -> Result<IncomingPhoneNumber, Error> {
        self.post(&format!("IncomingPhoneNumbers/{number_sid}.json"), update)
            .await
    }

    // ── Voice applications ───────────────────────────────────────────

    /// List voice applications filtered by exact friendly name.
    pub async fn list_applications_named(
        &self,
        friendly_name: &str,
    ) -> Result<Vec<VoiceApplication>, Error> {
        let page: VoiceApplicationPage = self
            .get_with_params(
                "Applications.json",
                &[
                    ("FriendlyName", friendly_name.to_string()),
                    ("PageSize", "1".to_string()),
                ],
            )
            .await?;
        Ok(page.applications)
    }

    /// Create a voice application.
    pub async fn create_application(
        &self,
        params: &ApplicationParams,
    ) -> Result<VoiceApplication, Error> {
        self.post("Applications.json", params).await
    }

    /// Update an existing voice application.
    pub async fn update_application(
        &self,
        app_sid: &str,
        params: &ApplicationParams,
    ) -> Result<VoiceApplication, Error> {
        self.post(&format!("Applications/{app_sid}.json"), params)
            .await
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join an account-relative path (e.g. `"Applications.json"`) onto the
    /// base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self
            .base_url
            .join(&format!("Accounts/{}/{path}", self.account_sid))?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .basic_auth(&self.api_key_sid, Some(self.api_key_secret.expose_secret()))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self
            .http
            .get(url)
            .query(params)
            .basic_auth(&self.api_key_sid, Some(self.api_key_secret.expose_secret()))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        form: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .form(form)
            .basic_auth(&self.api_key_sid, Some(self.api_key_secret.expose_secret()))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = &body[..body.len().min(200)];
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(parse_error(status, resp).await)
        }
    }
}

async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
    if status == StatusCode::UNAUTHORIZED {
        return Error::Authentication;
    }

    let raw = resp.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorBody>(&raw) {
        Ok(body) => Error::Api {
            status: status.as_u16(),
            message: body.message.unwrap_or_else(|| status.to_string()),
            code: body.code,
        },
        Err(_) => Error::Api {
            status: status.as_u16(),
            message: if raw.is_empty() {
                status.to_string()
            } else {
                raw
            },
            code: None,
        },
    }
}

/// Ensure the base URL ends with a slash so relative joins behave.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base_url("https://api.example.com/2010-04-01").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/2010-04-01/");
    }

    #[test]
    fn account_path_joins_under_base() {
        let creds = PlatformCredentials {
            account_sid: "AC123".into(),
            api_key_sid: "SK123".into(),
            api_key_secret: SecretString::from("secret".to_string()),
        };
        let client = PlatformClient::with_base_url(&creds, "http://localhost:1/v1").unwrap();
        let url = client.url("Applications.json").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1/v1/Accounts/AC123/Applications.json");
    }
}
