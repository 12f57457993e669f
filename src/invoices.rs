use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::{Arc, Mutex};

use crate::catalog::{CatalogItem, STARS_CURRENCY};

/// Invoice
///
/// The parameters of a Bot API `sendInvoice` call, serialized as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub chat_id: i64,
    pub title: String,
    pub description: String,
    pub payload: String,
    pub provider_token: String,
    pub currency: String,
    pub prices: Vec<LabeledPrice>,
    pub start_parameter: String,
}

/// One price line of an invoice. For Stars the amount is the number of Stars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPrice {
    pub label: String,
    pub amount: u32,
}

impl Invoice {
    /// Builds a Stars invoice for one catalog item.
    pub fn for_item(
        item: &CatalogItem,
        chat_id: i64,
        payload: String,
        provider_token: &str,
    ) -> Self {
        Self {
            chat_id,
            title: item.name.to_string(),
            description: item.description.to_string(),
            payload,
            provider_token: provider_token.to_string(),
            currency: STARS_CURRENCY.to_string(),
            prices: vec![LabeledPrice {
                label: item.name.to_string(),
                amount: item.price,
            }],
            start_parameter: "start_parameter".to_string(),
        }
    }
}

/// InvoiceError
///
/// Failure of a payment provider call. Handlers turn every variant into a
/// `502 Bad Gateway`; the detail only reaches the logs.
#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    /// The Bot API could not be reached or answered with something that is not
    /// a Bot API envelope. The request URL (which holds the token) is stripped.
    #[error("bot api transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The Bot API answered `ok: false`; carries its `description`.
    #[error("bot api rejected the call: {0}")]
    Rejected(String),

    /// Returned by a [`MockInvoiceService`] built with `new_failing`.
    #[error("simulated invoice failure")]
    Simulated,
}

/// InvoiceService
///
/// Contract for the payment provider. Handlers only see this trait, so the
/// Telegram client can be swapped for the in-process mock in local runs and tests.
#[async_trait]
pub trait InvoiceService: Send + Sync {
    /// Sends the invoice to the chat and returns the id of the invoice message.
    async fn send_invoice(&self, invoice: &Invoice) -> Result<i64, InvoiceError>;

    /// Returns a Stars payment identified by its charge id to the user.
    async fn refund_star_payment(&self, user_id: i64, charge_id: &str) -> Result<(), InvoiceError>;
}

/// Shared handle stored in the application state.
pub type InvoiceState = Arc<dyn InvoiceService>;

/// TelegramInvoiceClient
///
/// Talks to the Telegram Bot API over HTTPS. The bot token is part of the
/// endpoint URL, so transport errors are stripped of their URL before they
/// can reach a log line.
#[derive(Clone)]
pub struct TelegramInvoiceClient {
    http: reqwest::Client,
    endpoint: String,
}

/// Envelope of every Bot API reply.
#[derive(Deserialize)]
struct BotApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Serialize)]
struct RefundStarPayment<'a> {
    user_id: i64,
    telegram_payment_charge_id: &'a str,
}

impl TelegramInvoiceClient {
    /// new
    ///
    /// `api_base` is the Bot API root (`https://api.telegram.org` in
    /// production); a trailing slash is ignored. Methods are posted to
    /// `<api_base>/bot<token>/<method>` as JSON.
    pub fn new(api_base: &str, bot_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        }
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, InvoiceError>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let reply = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .json(params)
            .send()
            .await
            .map_err(|e| InvoiceError::Transport(e.without_url()))?
            .json::<BotApiReply<R>>()
            .await
            .map_err(|e| InvoiceError::Transport(e.without_url()))?;

        match reply {
            BotApiReply {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            BotApiReply { description, .. } => Err(InvoiceError::Rejected(
                description.unwrap_or_else(|| format!("{method} returned no result")),
            )),
        }
    }
}

#[async_trait]
impl InvoiceService for TelegramInvoiceClient {
    async fn send_invoice(&self, invoice: &Invoice) -> Result<i64, InvoiceError> {
        let message: SentMessage = self.call("sendInvoice", invoice).await?;
        Ok(message.message_id)
    }

    async fn refund_star_payment(&self, user_id: i64, charge_id: &str) -> Result<(), InvoiceError> {
        let refunded: bool = self
            .call(
                "refundStarPayment",
                &RefundStarPayment {
                    user_id,
                    telegram_payment_charge_id: charge_id,
                },
            )
            .await?;

        if refunded {
            Ok(())
        } else {
            Err(InvoiceError::Rejected("refund was not accepted".to_string()))
        }
    }
}

/// MockInvoiceService
///
/// In-process stand-in used for local runs without a `BOT_TOKEN` and for tests.
/// Records every invoice it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct MockInvoiceService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    sent: Arc<Mutex<Vec<Invoice>>>,
}

/// Message id the mock reports for every invoice.
pub const MOCK_INVOICE_MESSAGE_ID: i64 = 42;

impl MockInvoiceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose every call fails with [`InvoiceError::Simulated`].
    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of the invoices sent so far, oldest first.
    pub fn sent_invoices(&self) -> Vec<Invoice> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InvoiceService for MockInvoiceService {
    async fn send_invoice(&self, invoice: &Invoice) -> Result<i64, InvoiceError> {
        if self.should_fail {
            return Err(InvoiceError::Simulated);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(invoice.clone());
        }
        Ok(MOCK_INVOICE_MESSAGE_ID)
    }

    async fn refund_star_payment(&self, _user_id: i64, _charge_id: &str) -> Result<(), InvoiceError> {
        if self.should_fail {
            return Err(InvoiceError::Simulated);
        }
        Ok(())
    }
}
