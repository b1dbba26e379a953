// Integration tests for `PlatformClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dialtone_platform_api::{
    ApplicationParams, Error, NumberUpdate, PlatformClient, PlatformCredentials,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn credentials() -> PlatformCredentials {
    PlatformCredentials {
        account_sid: "AC123".into(),
        api_key_sid: "SK456".into(),
        api_key_secret: SecretString::from("shhh".to_string()),
    }
}

async fn setup() -> (MockServer, PlatformClient) {
    let server = MockServer::start().await;
    let client = PlatformClient::with_base_url(&credentials(), &server.uri()).unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_incoming_numbers() {
    let (server, client) = setup().await;

    let body = json!({
        "incoming_phone_numbers": [
            { "sid": "PN1", "phone_number": "+15551230001" },
            { "sid": "PN2", "phone_number": "+15551230002", "voice_application_sid": "AP1" },
        ]
    });

    Mock::given(method("GET"))
        .and(path("/Accounts/AC123/IncomingPhoneNumbers.json"))
        .and(query_param("PageSize", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let numbers = client.list_incoming_numbers(100).await.unwrap();

    assert_eq!(numbers.len(), 2);
    assert_eq!(numbers[0].sid, "PN1");
    assert_eq!(numbers[0].phone_number, "+15551230001");
    assert_eq!(numbers[1].voice_application_sid.as_deref(), Some("AP1"));
}

#[tokio::test]
async fn test_fetch_incoming_number() {
    let (server, client) = setup().await;

    let body = json!({
        "sid": "PN123",
        "phone_number": "+15551234567",
        "voice_url": "https://old.example/webhook",
        "voice_method": "POST"
    });

    Mock::given(method("GET"))
        .and(path("/Accounts/AC123/IncomingPhoneNumbers/PN123.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let number = client.fetch_incoming_number("PN123").await.unwrap();
    assert_eq!(number.phone_number, "+15551234567");
    assert_eq!(number.voice_url.as_deref(), Some("https://old.example/webhook"));
}

#[tokio::test]
async fn test_update_incoming_number_sends_form_fields() {
    let (server, client) = setup().await;

    let body = json!({
        "sid": "PN123",
        "phone_number": "+15551234567",
        "voice_application_sid": "AP9"
    });

    Mock::given(method("POST"))
        .and(path("/Accounts/AC123/IncomingPhoneNumbers/PN123.json"))
        .and(body_string_contains("VoiceApplicationSid=AP9"))
        .and(body_string_contains("VoiceUrl="))
        .and(body_string_contains("VoiceMethod=POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let update = NumberUpdate {
        voice_application_sid: Some("AP9".into()),
        voice_url: Some(String::new()),
        voice_method: Some("POST".into()),
        status_callback: Some(String::new()),
        status_callback_method: Some("POST".into()),
    };
    let number = client.update_incoming_number("PN123", &update).await.unwrap();
    assert_eq!(number.voice_application_sid.as_deref(), Some("AP9"));
}

#[tokio::test]
async fn test_list_applications_named_filters_by_name() {
    let (server, client) = setup().await;

    let body = json!({
        "applications": [
            { "sid": "AP1", "friendly_name": "Dialtone Auto App",
              "voice_url": "https://fn.example/voice", "voice_method": "POST" }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/Accounts/AC123/Applications.json"))
        .and(query_param("FriendlyName", "Dialtone Auto App"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let apps = client.list_applications_named("Dialtone Auto App").await.unwrap();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].sid, "AP1");
    assert_eq!(apps[0].voice_url.as_deref(), Some("https://fn.example/voice"));
}

#[tokio::test]
async fn test_create_application() {
    let (server, client) = setup().await;

    let body = json!({
        "sid": "APNEW",
        "friendly_name": "Dialtone Auto App",
        "voice_url": "https://fn.example/voice",
        "voice_method": "POST"
    });

    Mock::given(method("POST"))
        .and(path("/Accounts/AC123/Applications.json"))
        .and(body_string_contains("FriendlyName=Dialtone+Auto+App"))
        .and(body_string_contains("VoiceMethod=POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&body))
        .mount(&server)
        .await;

    let params = ApplicationParams {
        friendly_name: Some("Dialtone Auto App".into()),
        voice_url: Some("https://fn.example/voice".into()),
        voice_method: Some("POST".into()),
    };
    let app = client.create_application(&params).await.unwrap();
    assert_eq!(app.sid, "APNEW");
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/Accounts/AC123/IncomingPhoneNumbers.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": 20003, "message": "Authenticate", "status": 401
        })))
        .mount(&server)
        .await;

    let err = client.list_incoming_numbers(100).await.unwrap_err();
    assert!(matches!(err, Error::Authentication));
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_api_error_body_is_parsed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/Accounts/AC123/IncomingPhoneNumbers/PN404.json"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 20404, "message": "The requested resource was not found", "status": 404
        })))
        .mount(&server)
        .await;

    let err = client.fetch_incoming_number("PN404").await.unwrap_err();
    match err {
        Error::Api { status, ref message, code } => {
            assert_eq!(status, 404);
            assert_eq!(code, Some(20404));
            assert!(message.contains("not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_malformed_success_body_is_a_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/Accounts/AC123/IncomingPhoneNumbers.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client.list_incoming_numbers(100).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}
