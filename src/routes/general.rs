use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// General Router Module
///
/// Unauthenticated endpoints with no business state.
pub fn general_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // GET /get
        // Fixed greeting.
        .route("/get", get(handlers::get_message))
        // POST /set
        // Greets the `name` from the JSON body.
        .route("/set", post(handlers::set_message))
        // GET /docs/openapi.json
        .route("/docs/openapi.json", get(handlers::openapi))
}
