use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use vyomai::{
    AppState, Config,
    assistant::{LlmConfig, OpenAiClient},
    clock::SystemClock,
    create_router,
    email::{DynEmailProvider, EmailMessage, ProviderKind, providers::mock::MockProvider},
    settings::{ContentSection, FileSettingsStore, SettingsStore, SiteSettings},
};

async fn setup_test_server(smtp: MockProvider) -> (TempDir, TestServer, Arc<MockProvider>) {
    let temp_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.settings.path = temp_dir.path().join("settings.toml");
    config.app.secret = "test-secret".to_string();

    let store = Arc::new(FileSettingsStore::new(config.settings.path.clone()));
    let mut settings = SiteSettings::default();
    settings.email.email_from_address = Some("hello@vyomai.cloud".to_string());
    settings.email.email_provider_priority = Some("smtp".to_string());
    settings.sections.insert(
        "hero".to_string(),
        ContentSection {
            title: "AI that ships".to_string(),
            subtitle: None,
            body: "We build production AI systems.".to_string(),
            visible: true,
        },
    );
    settings.sections.insert(
        "team".to_string(),
        ContentSection {
            title: "Team".to_string(),
            subtitle: None,
            body: "Coming soon".to_string(),
            visible: false,
        },
    );
    store.save(&settings).await.unwrap();

    let smtp = Arc::new(smtp);
    let state = AppState::new(
        config,
        store,
        vec![smtp.clone() as DynEmailProvider],
        Arc::new(OpenAiClient::new(LlmConfig::default(), None)),
        Arc::new(SystemClock),
    )
    .unwrap();

    let server = TestServer::new(create_router(state).into_make_service()).unwrap();
    (temp_dir, server, smtp)
}

fn html_of(message: &EmailMessage) -> String {
    message.body.html().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_contact_form_end_to_end() {
    let (_temp_dir, server, smtp) = setup_test_server(MockProvider::new(ProviderKind::Smtp)).await;

    let response = server
        .post("/api/contact")
        .json(&json!({
            "name": "Ada",
            "email": "ada@example.com",
            "subject": "Hi",
            "message": "Hello"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>()["success"], true);

    let sent = smtp.sent_messages().await;
    assert_eq!(sent.len(), 2);
    assert!(smtp.was_sent_to("hello@vyomai.cloud").await);
    assert!(smtp.was_sent_to("ada@example.com").await);
    assert!(html_of(&sent[1]).contains("Ada"));
}

#[tokio::test]
async fn test_contact_form_requires_fields() {
    let (_temp_dir, server, smtp) = setup_test_server(MockProvider::new(ProviderKind::Smtp)).await;

    let response = server
        .post("/api/contact")
        .json(&json!({
            "name": "Ada",
            "email": "not-an-email",
            "subject": "Hi",
            "message": "Hello"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/contact")
        .json(&json!({
            "name": " ",
            "email": "ada@example.com",
            "subject": "Hi",
            "message": "Hello"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert_eq!(smtp.attempt_count(), 0);
}

#[tokio::test]
async fn test_bounced_address_returns_422() {
    let (_temp_dir, server, _smtp) = setup_test_server(MockProvider::failing(
        ProviderKind::Smtp,
        "550 5.1.1 <nobody@example.com>: Recipient address rejected",
    ))
    .await;

    let response = server
        .post("/api/contact")
        .json(&json!({
            "name": "Nobody",
            "email": "nobody@example.com",
            "subject": "Hi",
            "message": "Hello"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<serde_json::Value>();
    assert!(body["error"].as_str().unwrap().contains("check your email address"));
}

#[tokio::test]
async fn test_transport_failure_returns_502() {
    let (_temp_dir, server, _smtp) = setup_test_server(MockProvider::failing(
        ProviderKind::Smtp,
        "Connection refused (os error 111)",
    ))
    .await;

    let response = server
        .post("/api/bookings")
        .json(&json!({
            "name": "Grace",
            "email": "grace@example.com",
            "service": "AI Strategy Workshop"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_booking_and_pricing_requests() {
    let (_temp_dir, server, smtp) = setup_test_server(MockProvider::new(ProviderKind::Smtp)).await;

    server
        .post("/api/bookings")
        .json(&json!({
            "name": "Grace",
            "email": "grace@example.com",
            "service": "AI Strategy Workshop",
            "preferred_date": "2026-11-02"
        }))
        .await
        .assert_status_ok();

    server
        .post("/api/pricing-request")
        .json(&json!({
            "name": "Linus",
            "email": "linus@example.com",
            "plan": "Enterprise"
        }))
        .await
        .assert_status_ok();

    let sent = smtp.sent_messages().await;
    assert_eq!(sent.len(), 4);
    assert!(html_of(&sent[1]).contains("AI Strategy Workshop"));
    assert!(html_of(&sent[3]).contains("Enterprise"));
}

#[tokio::test]
async fn test_content_lists_visible_sections() {
    let (_temp_dir, server, _smtp) = setup_test_server(MockProvider::new(ProviderKind::Smtp)).await;

    let response = server.get("/api/content").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["hero"]["title"], "AI that ships");
    assert!(body.get("team").is_none());
}

#[tokio::test]
async fn test_health() {
    let (_temp_dir, server, _smtp) = setup_test_server(MockProvider::new(ProviderKind::Smtp)).await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "ok");
}
