use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use unigram_payment_api::{
    AppConfig, AppState, InvoiceState, MockInvoiceService, create_router,
    models::{MessageResponse, SessionInfo, SessionToken},
};

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub invoices: MockInvoiceService,
}

async fn spawn_app() -> TestApp {
    let invoices = MockInvoiceService::new();
    let state = AppState {
        config: AppConfig::default(),
        invoices: Arc::new(invoices.clone()) as InvoiceState,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, invoices }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/health", app.address))
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_general_greetings() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let hello: MessageResponse = client
        .get(format!("{}/api/get", app.address))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(hello.message, "Hello !");

    let named: MessageResponse = client
        .post(format!("{}/api/set", app.address))
        .json(&json!({ "name": "Vlad" }))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(named.message, "Hello Vlad");
}

#[tokio::test]
async fn test_login_then_session_roundtrip() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // 1. Login from an allowed browser origin
    let response = client
        .post(format!("{}/api/login", app.address))
        .header("Origin", "https://vghosts.github.io")
        .json(&json!({ "playerId": 777, "chatId": 555 }))
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://vghosts.github.io")
    );
    let session: SessionToken = response.json().await.unwrap();
    assert_eq!(session.token_type, "Bearer");

    // 2. The token identifies the player
    let info: SessionInfo = client
        .get(format!("{}/api/session", app.address))
        .bearer_auth(&session.token)
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(info.player_id, 777);
    assert!(info.expires_at.is_some());

    // 3. Without it the session route refuses
    let anonymous = client
        .get(format!("{}/api/session", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(anonymous.status(), 401);
}

#[tokio::test]
async fn test_invoice_flow_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let items: Vec<Value> = client
        .get(format!("{}/api/payment/items", app.address))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(items.len(), 4);

    let response = client
        .post(format!("{}/api/payment/create_invoice", app.address))
        .json(&json!({ "playerId": 7, "itemId": "flask_10", "chatId": 99 }))
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), 200);

    let sent = app.invoices.sent_invoices();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, "flask_10_7");
    assert_eq!(sent[0].chat_id, 99);
}

#[tokio::test]
async fn test_unknown_paths_are_not_found() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for path in ["/api/payment/balance", "/api/payment/get", "/nothing", "/"] {
        let response = client
            .get(format!("{}{}", app.address, path))
            .send()
            .await
            .expect("req fail");
        assert_eq!(response.status(), 404, "GET {path}");
    }
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/login", app.address))
        .header("Content-Type", "application/json")
        .body("{\"playerId\": ")
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 400);
}
