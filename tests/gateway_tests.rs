use axum::{
    Router,
    body::Body,
    extract::OriginalUri,
    http::{Method, Request, StatusCode, Uri, header},
    response::Response,
    routing::{get, post},
};
use serde_json::Value;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tower::ServiceExt;
use unigram_payment_api::{
    AppConfig, RouteTable, compose_gateway, error::ErrorBody, middleware::Payload,
};

// --- Stub collaborators ---

/// Hit counters of the three stub collaborators.
#[derive(Clone, Default)]
struct Hits {
    general: Arc<AtomicUsize>,
    auth: Arc<AtomicUsize>,
    payment: Arc<AtomicUsize>,
}

fn counted(counter: &Arc<AtomicUsize>, reply: &'static str) -> impl Fn() -> std::future::Ready<&'static str> + Clone + use<> {
    let counter = counter.clone();
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(reply)
    }
}

fn general_stub(hits: &Hits) -> Router {
    Router::new()
        .route("/who", get(counted(&hits.general, "general")))
        .route("/shared", get(counted(&hits.general, "general")))
        .route("/payment/balance", get(counted(&hits.general, "general")))
        .route("/strict", post(counted(&hits.general, "general")))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
}

fn auth_stub(hits: &Hits) -> Router {
    let echo_hits = hits.auth.clone();
    Router::new()
        .route("/who", get(counted(&hits.auth, "auth")))
        .route("/login", post(counted(&hits.auth, "auth")))
        .route(
            "/shared",
            post(move |body: String| async move {
                echo_hits.fetch_add(1, Ordering::SeqCst);
                body
            }),
        )
        .route(
            "/parsed",
            post(|Payload(value): Payload<Value>| async move { value.to_string() }),
        )
}

fn payment_stub(hits: &Hits) -> Router {
    Router::new()
        .route("/items", get(counted(&hits.payment, "payment")))
        .route(
            "/where",
            get(|uri: Uri, OriginalUri(original): OriginalUri| async move {
                format!("{uri} {original}")
            }),
        )
}

fn gateway_with(hits: &Hits, config: &AppConfig) -> Router {
    let table = RouteTable::new(config.body_limit)
        .mount("general", "/api", general_stub(hits))
        .mount("auth", "/api", auth_stub(hits))
        .mount("payment", "/api/payment", payment_stub(hits));
    compose_gateway(table, config)
}

fn gateway(hits: &Hits) -> Router {
    gateway_with(hits, &AppConfig::default())
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn json_post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// --- Dispatch order ---

#[tokio::test]
async fn test_general_wins_over_auth() {
    let hits = Hits::default();

    let response = gateway(&hits).oneshot(get_request("/api/who")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "general");
    assert_eq!(hits.general.load(Ordering::SeqCst), 1);
    assert_eq!(hits.auth.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unmatched_general_falls_through_to_auth() {
    let hits = Hits::default();

    let response = gateway(&hits)
        .oneshot(json_post("/api/login", r#"{"playerId": 1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "auth");
    assert_eq!(hits.general.load(Ordering::SeqCst), 0);
    assert_eq!(hits.auth.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_method_mismatch_falls_through_with_body_intact() {
    let hits = Hits::default();

    let response = gateway(&hits)
        .oneshot(json_post("/api/shared", r#"{"a": 1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"a": 1}"#);
    assert_eq!(hits.general.load(Ordering::SeqCst), 0);
    assert_eq!(hits.auth.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_payment_prefix_is_exclusive() {
    let hits = Hits::default();
    let app = gateway(&hits);

    let response = app
        .clone()
        .oneshot(get_request("/api/payment/items"))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "payment");

    // general has a /payment/balance route, but /api/payment belongs to payment alone
    let response = app
        .oneshot(get_request("/api/payment/balance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(hits.general.load(Ordering::SeqCst), 0);
    assert_eq!(hits.payment.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_collaborator_sees_stripped_path_and_query() {
    let hits = Hits::default();

    let response = gateway(&hits)
        .oneshot(get_request("/api/payment/where?lang=en"))
        .await
        .unwrap();

    assert_eq!(
        body_text(response).await,
        "/where?lang=en /api/payment/where?lang=en"
    );
}

#[tokio::test]
async fn test_unregistered_path_is_not_found() {
    let hits = Hits::default();
    let app = gateway(&hits);

    for path in ["/api/nowhere", "/apix/who", "/health", "/"] {
        let response = app.clone().oneshot(get_request(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {path}");

        let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body.status, 404);
    }
}

#[tokio::test]
async fn test_trailing_slash_reaches_route() {
    let hits = Hits::default();
    let app = gateway(&hits);

    let response = app.clone().oneshot(get_request("/api/who/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "general");

    let response = app
        .oneshot(get_request("/api/payment/items/"))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "payment");
}

// --- JSON body parsing ---

#[tokio::test]
async fn test_malformed_json_never_reaches_collaborators() {
    let hits = Hits::default();

    let response = gateway(&hits)
        .oneshot(json_post("/api/login", r#"{"playerId": "#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(hits.general.load(Ordering::SeqCst), 0);
    assert_eq!(hits.auth.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scalar_json_top_level_is_rejected() {
    let hits = Hits::default();
    let app = gateway(&hits);

    for body in ["42", r#""text""#, "null"] {
        let response = app
            .clone()
            .oneshot(json_post("/api/strict", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
    }
    assert_eq!(hits.general.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_parsed_body_reaches_handlers() {
    let hits = Hits::default();
    let app = gateway(&hits);

    let response = app
        .clone()
        .oneshot(json_post("/api/parsed", r#"{"k":[1,2]}"#))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, r#"{"k":[1,2]}"#);

    // An empty JSON body is an empty object
    let response = app.oneshot(json_post("/api/parsed", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "{}");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let hits = Hits::default();
    let config = AppConfig {
        body_limit: 16,
        ..AppConfig::default()
    };

    let response = gateway_with(&hits, &config)
        .oneshot(json_post("/api/login", r#"{"playerId": 1, "padding": "xxxxxxxxxxxxxxxx"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(hits.auth.load(Ordering::SeqCst), 0);
}

// --- Methods and CORS ---

#[tokio::test]
async fn test_disallowed_method_is_405() {
    let hits = Hits::default();

    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/api/who")
        .body(Body::empty())
        .unwrap();
    let response = gateway(&hits).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.headers().get(header::ALLOW).unwrap(),
        "GET, POST, PUT, DELETE"
    );
    assert_eq!(hits.general.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_allows_known_origins_only() {
    let hits = Hits::default();
    let app = gateway(&hits);

    let allowed = Request::builder()
        .uri("/api/who")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );

    let foreign = Request::builder()
        .uri("/api/who")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(foreign).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_preflight_is_answered_before_dispatch() {
    let hits = Hits::default();

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/login")
        .header(header::ORIGIN, "https://vghosts.github.io")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,authorization")
        .body(Body::empty())
        .unwrap();
    let response = gateway(&hits).oneshot(preflight).await.unwrap();

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://vghosts.github.io"
    );
    let methods = headers
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap();
    for method in ["GET", "POST", "PUT", "DELETE"] {
        assert!(methods.contains(method), "{methods}");
    }
    assert_eq!(hits.auth.load(Ordering::SeqCst), 0);
}

// --- Timeouts and gateway errors seen from the browser ---

fn strict_config() -> AppConfig {
    AppConfig {
        body_limit: 16,
        request_timeout: Duration::from_millis(50),
        ..AppConfig::default()
    }
}

fn from_frontend(method: Method, uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_slow_collaborator_times_out_with_cors_headers() {
    let hits = Hits::default();

    let response = gateway_with(&hits, &strict_config())
        .oneshot(from_frontend(Method::GET, "/api/slow", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_gateway_errors_carry_cors_headers() {
    let hits = Hits::default();
    let app = gateway_with(&hits, &strict_config());

    let cases = [
        (from_frontend(Method::POST, "/api/strict", "{"), StatusCode::BAD_REQUEST),
        (from_frontend(Method::GET, "/api/nowhere", ""), StatusCode::NOT_FOUND),
        (from_frontend(Method::PATCH, "/api/who", ""), StatusCode::METHOD_NOT_ALLOWED),
        (
            from_frontend(Method::POST, "/api/login", r#"{"playerId": 1, "pad": "xxxxxxxx"}"#),
            StatusCode::PAYLOAD_TOO_LARGE,
        ),
        (from_frontend(Method::GET, "/api/slow", ""), StatusCode::REQUEST_TIMEOUT),
    ];

    for (request, expected) in cases {
        let uri = request.uri().clone();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), expected, "{uri}");
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .map(|value| value.to_str().unwrap()),
            Some("http://localhost:3000"),
            "{uri}"
        );
    }
    assert_eq!(hits.general.load(Ordering::SeqCst), 0);
    assert_eq!(hits.auth.load(Ordering::SeqCst), 0);
}
