use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::invoices::InvoiceError;

/// ApiError
///
/// Every per-request failure the gateway or a collaborator can produce.
/// Each variant maps to one status code. Upstream and internal causes are
/// logged and never reach the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Return `404 Not Found`
    #[error("request path not found")]
    NotFound,

    /// Return `400 Bad Request` for a JSON body that does not parse.
    #[error("request body is not valid JSON")]
    MalformedJson,

    /// Return `400 Bad Request`
    #[error("{0}")]
    BadRequest(String),

    /// Return `422 Unprocessable Entity` for well-formed JSON of the wrong shape.
    #[error("{0}")]
    UnprocessableEntity(String),

    /// Return `401 Unauthorized`
    #[error("authorization required")]
    Unauthorized,

    /// Return `405 Method Not Allowed`
    #[error("method not allowed")]
    MethodNotAllowed { allow: String },

    /// Return `413 Payload Too Large`
    #[error("request body exceeds the size limit")]
    PayloadTooLarge,

    /// Return `502 Bad Gateway`. The source is logged, not returned.
    #[error("payment provider request failed")]
    Upstream(#[from] InvoiceError),

    /// Return `500 Internal Server Error`. The detail is logged, not returned.
    #[error("an internal server error has occurred")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a `400` whose message is shown to the client verbatim.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MalformedJson | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::NotFound => "Not Found",
            Self::MalformedJson | Self::BadRequest(_) => "Bad Request",
            Self::UnprocessableEntity(_) => "Unprocessable Entity",
            Self::Unauthorized => "Unauthorized",
            Self::MethodNotAllowed { .. } => "Method Not Allowed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::Upstream(_) => "Bad Gateway",
            Self::Internal(_) => "Internal Server Error",
        }
    }
}

/// ErrorBody
///
/// JSON shape of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub title: String,
    pub status: u16,
    pub message: String,
}

impl From<&ApiError> for ErrorBody {
    fn from(error: &ApiError) -> Self {
        Self {
            title: error.title().to_string(),
            status: error.status_code().as_u16(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upstream(source) => tracing::error!(error = %source, "payment provider failure"),
            Self::Internal(detail) => tracing::error!(%detail, "internal error"),
            _ => {}
        }

        let mut headers = HeaderMap::new();
        match &self {
            Self::Unauthorized => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            Self::MethodNotAllowed { allow } => {
                if let Ok(value) = HeaderValue::from_str(allow) {
                    headers.insert(header::ALLOW, value);
                }
            }
            _ => {}
        }

        (self.status_code(), headers, Json(ErrorBody::from(&self))).into_response()
    }
}
