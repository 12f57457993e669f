use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, StatusCode},
    middleware::from_fn_with_state,
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod invoices;
pub mod middleware;
pub mod models;
pub mod server;

// The three collaborators mounted by the gateway (general, auth, payment).
pub mod routes;
use routes::{auth::auth_routes, general::general_routes, payment::payment_routes};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use dispatch::RouteTable;
pub use error::ApiError;
pub use invoices::{InvoiceState, MockInvoiceService, TelegramInvoiceClient};

use middleware::{
    JsonBodyLimit, MethodPolicy, cors_layer, parse_json_body, reject_disallowed_methods,
};

/// ApiDoc
///
/// OpenAPI document for every collaborator endpoint, served by the general
/// routes at `/api/docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::get_message, handlers::set_message,
        handlers::login, handlers::get_session,
        handlers::list_items, handlers::create_invoice, handlers::refund
    ),
    components(
        schemas(
            models::MessageResponse, models::SetMessageRequest, models::LoginRequest,
            models::SessionToken, models::SessionInfo, models::ItemResponse,
            models::CreateInvoiceRequest, models::CreateInvoiceResponse,
            models::RefundRequest, models::RefundResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "unigram-payment", description = "Unigram Payment API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared by every collaborator: the immutable configuration and the payment
/// provider handle.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub invoices: InvoiceState,
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for InvoiceState {
    fn from_ref(app_state: &AppState) -> InvoiceState {
        app_state.invoices.clone()
    }
}

/// route_table
///
/// The fixed route table. General and auth share `/api` and are tried in that
/// order; payment owns `/api/payment`.
pub fn route_table(state: AppState) -> RouteTable {
    RouteTable::new(state.config.body_limit)
        .mount("general", "/api", general_routes().with_state(state.clone()))
        .mount("auth", "/api", auth_routes().with_state(state.clone()))
        .mount("payment", "/api/payment", payment_routes().with_state(state))
}

/// create_router
///
/// The complete gateway for the application state.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    compose_gateway(route_table(state), &config)
}

/// compose_gateway
///
/// Wraps a route table in the global middleware stack. Outermost first:
/// request id, tracing, CORS, timeout, method check, JSON body parsing, then
/// the dispatcher as the router's fallback.
///
/// Every response the gateway produces itself (400, 404, 405, 408, 413) passes
/// back through the CORS layer, so an allowed browser origin can always read
/// the status and the JSON error body.
pub fn compose_gateway(table: RouteTable, config: &AppConfig) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .fallback(dispatch::dispatch)
        .with_state(Arc::new(table))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // CORS wraps the timeout so a 408 still carries the allow-origin header.
                .layer(cors_layer(&config.cors))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                ))
                .layer(from_fn_with_state(
                    MethodPolicy::new(&config.cors.allowed_methods),
                    reject_disallowed_methods,
                ))
                .layer(from_fn_with_state(
                    JsonBodyLimit(config.body_limit),
                    parse_json_body,
                )),
        )
}

/// trace_span_logger
///
/// Span for one request, tagged with its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
