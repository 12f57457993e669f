use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Auth Router Module
///
/// Issues and inspects player sessions. Shares the `/api` prefix with the
/// general routes and only sees requests they did not match.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /login
        // Exchanges a player id for a signed bearer token.
        .route("/login", post(handlers::login))
        // GET /session
        // Requires `Authorization: Bearer <token>`.
        .route("/session", get(handlers::get_session))
}
