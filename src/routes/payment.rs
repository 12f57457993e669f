use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Payment Router Module
///
/// Telegram Stars purchases. Every request under `/api/payment` lands here and
/// nowhere else, so a path missing from this router is a 404 even when a
/// general or auth route would otherwise have matched it.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        // GET /items
        .route("/items", get(handlers::list_items))
        // POST /create_invoice
        // Sends an invoice to the player's chat through the invoice service.
        .route("/create_invoice", post(handlers::create_invoice))
        // POST /refund
        // Authenticated: the refund goes to the session's player.
        .route("/refund", post(handlers::refund))
}
