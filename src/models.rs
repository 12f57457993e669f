use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::catalog::CatalogItem;

// --- General ---

/// MessageResponse
///
/// Greeting returned by the general `/get` and `/set` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// SetMessageRequest
///
/// Input for `POST /set`. A missing name greets "there".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SetMessageRequest {
    #[serde(default)]
    pub name: Option<String>,
}

// --- Auth ---

/// LoginRequest
///
/// Input for `POST /login`. The player id is the Telegram user the game
/// mini-app runs for; the chat id is informational.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub player_id: i64,
    #[serde(default)]
    pub chat_id: Option<i64>,
}

/// SessionToken
///
/// A signed session issued by `POST /login`. Send it back as
/// `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionToken {
    pub token: String,
    pub token_type: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// SessionInfo
///
/// The identity resolved from a session, returned by `GET /session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionInfo {
    pub player_id: i64,
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
}

// --- Payment ---

/// ItemResponse
///
/// Public view of a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub price: u32,
    pub description: String,
}

impl From<&CatalogItem> for ItemResponse {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name.to_string(),
            price: item.price,
            description: item.description.to_string(),
        }
    }
}

/// CreateInvoiceRequest
///
/// Input for `POST /payment/create_invoice`. Every field is required; they are
/// optional here so a missing one yields a 400 instead of a deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    pub player_id: Option<i64>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<i64>,
}

/// CreateInvoiceResponse
///
/// Returned once the invoice message is in the player's chat. The purchase
/// itself settles later, inside Telegram.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateInvoiceResponse {
    pub success: bool,
    pub invoice_message_id: i64,
}

/// RefundRequest
///
/// Input for `POST /payment/refund`: the Telegram payment charge id printed
/// to the player after a successful purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefundRequest {
    #[serde(default)]
    pub charge_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RefundResponse {
    pub success: bool,
    pub message: String,
}
