use axum::{Json, extract::State};
use utoipa::OpenApi;

use crate::{
    ApiDoc, AppState,
    auth::{self, AuthPlayer},
    catalog::{self, CATALOG},
    config::AppConfig,
    error::{ApiError, ErrorBody},
    invoices::Invoice,
    middleware::Payload,
    models::{
        CreateInvoiceRequest, CreateInvoiceResponse, ItemResponse, LoginRequest,
        MessageResponse, RefundRequest, RefundResponse, SessionInfo, SessionToken,
        SetMessageRequest,
    },
};

/// Message returned once the provider accepted a refund.
pub const REFUND_SUCCESS: &str =
    "Refund processed successfully! The Stars have been returned to your balance.";
/// 400 message for a refund request without a usable `chargeId`.
pub const REFUND_USAGE: &str =
    "Provide the transaction id of the purchase as chargeId, e.g. {\"chargeId\": \"YOUR_TRANSACTION_ID\"}";

// --- General ---

/// health
///
/// Liveness probe for load balancers and uptime checks.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// get_message
///
/// Fixed greeting, used by the frontend as a connectivity check.
#[utoipa::path(
    get,
    path = "/api/get",
    responses((status = 200, description = "Greeting", body = MessageResponse))
)]
pub async fn get_message() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello !".to_string(),
    })
}

/// set_message
///
/// Greets the name in the body, or "there" when none is given.
#[utoipa::path(
    post,
    path = "/api/set",
    request_body = SetMessageRequest,
    responses((status = 200, description = "Greeting", body = MessageResponse))
)]
pub async fn set_message(Payload(payload): Payload<SetMessageRequest>) -> Json<MessageResponse> {
    let name = payload.name.unwrap_or_else(|| "there".to_string());
    Json(MessageResponse {
        message: format!("Hello {name}"),
    })
}

/// openapi
///
/// Serves the generated OpenAPI document.
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// --- Auth ---

/// login
///
/// [Auth Route] Issues a signed session for a game player.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionToken),
        (status = 400, description = "Invalid player id", body = ErrorBody)
    )
)]
pub async fn login(
    State(config): State<AppConfig>,
    Payload(request): Payload<LoginRequest>,
) -> Result<Json<SessionToken>, ApiError> {
    if request.player_id <= 0 {
        return Err(ApiError::bad_request("playerId must be a positive integer"));
    }

    let session = auth::issue_session(&config, request.player_id, request.chat_id)?;
    tracing::info!(player_id = request.player_id, "session issued");
    Ok(Json(session))
}

/// get_session
///
/// [Auth Route] Echoes the identity behind the presented session.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Current session", body = SessionInfo),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn get_session(player: AuthPlayer) -> Json<SessionInfo> {
    Json(SessionInfo {
        player_id: player.player_id,
        expires_at: player.expires_at,
    })
}

// --- Payment ---

/// list_items
///
/// [Payment Route] The purchasable catalog.
#[utoipa::path(
    get,
    path = "/api/payment/items",
    responses((status = 200, description = "Catalog", body = [ItemResponse]))
)]
pub async fn list_items() -> Json<Vec<ItemResponse>> {
    Json(CATALOG.iter().map(ItemResponse::from).collect())
}

/// create_invoice
///
/// [Payment Route] Sends a Telegram Stars invoice for one catalog item to the
/// player's chat. The invoice payload is `<itemId>_<playerId>` so the purchase
/// can be credited to the right player once it settles.
#[utoipa::path(
    post,
    path = "/api/payment/create_invoice",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 200, description = "Invoice sent", body = CreateInvoiceResponse),
        (status = 400, description = "Missing parameters or unknown item", body = ErrorBody),
        (status = 502, description = "Payment provider failure", body = ErrorBody)
    )
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    Payload(request): Payload<CreateInvoiceRequest>,
) -> Result<Json<CreateInvoiceResponse>, ApiError> {
    let (Some(player_id), Some(item_id), Some(chat_id)) = (
        request.player_id.filter(|id| *id != 0),
        request.item_id.filter(|id| !id.is_empty()),
        request.chat_id.filter(|id| *id != 0),
    ) else {
        return Err(ApiError::bad_request("Missing required parameters"));
    };

    let item = catalog::find_item(&item_id).ok_or_else(|| ApiError::bad_request("Invalid item ID"))?;

    let invoice = Invoice::for_item(
        item,
        chat_id,
        catalog::invoice_payload(item, player_id),
        &state.config.provider_token,
    );
    let message_id = state.invoices.send_invoice(&invoice).await?;

    tracing::info!(player_id, chat_id, item = item.id, message_id, "invoice sent");

    Ok(Json(CreateInvoiceResponse {
        success: true,
        invoice_message_id: message_id,
    }))
}

/// refund
///
/// [Payment Route, authenticated] Refunds a Stars payment made by the session's player.
#[utoipa::path(
    post,
    path = "/api/payment/refund",
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refunded", body = RefundResponse),
        (status = 400, description = "Missing charge id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 502, description = "Payment provider failure", body = ErrorBody)
    )
)]
pub async fn refund(
    player: AuthPlayer,
    State(state): State<AppState>,
    Payload(request): Payload<RefundRequest>,
) -> Result<Json<RefundResponse>, ApiError> {
    let charge_id = request
        .charge_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(REFUND_USAGE))?;

    state
        .invoices
        .refund_star_payment(player.player_id, &charge_id)
        .await?;

    tracing::info!(player_id = player.player_id, %charge_id, "refund processed");

    Ok(Json(RefundResponse {
        success: true,
        message: REFUND_SUCCESS.to_string(),
    }))
}
