use std::{net::Ipv4Addr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use unigram_payment_api::{
    AppConfig, AppState, MockInvoiceService, create_router,
    models::MessageResponse,
    server::{self, StartupError},
};

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let occupied = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = server::bind(port).await;

    match result {
        Err(StartupError::Bind { port: failed, .. }) => assert_eq!(failed, port),
        Err(other) => panic!("expected a bind error, got {other}"),
        Ok(_) => panic!("second bind on port {port} succeeded"),
    }
}

#[tokio::test]
async fn test_serve_answers_on_bound_listener() {
    let listener = server::bind(0).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = AppConfig::default();
    let app = create_router(AppState {
        config: config.clone(),
        invoices: Arc::new(MockInvoiceService::new()),
    });
    tokio::spawn(async move { server::serve(listener, app, &config).await });

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let greeting: MessageResponse = client
        .get(format!("http://127.0.0.1:{port}/api/get"))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();

    assert_eq!(greeting.message, "Hello !");
}
