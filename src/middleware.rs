//! Global middleware, applied to every request before dispatch.
//!
//! Order on the way in: CORS, method check, JSON body parsing.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, Method, header, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{config::CorsPolicy, error::ApiError};

/// cors_layer
///
/// Translates the policy into a `CorsLayer`. Allowed origins are reflected in
/// `Access-Control-Allow-Origin`; any other origin gets no CORS headers.
/// Preflight `OPTIONS` requests are answered here and never reach dispatch.
pub fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let origins: Vec<HeaderValue> = policy
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unrepresentable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(policy.allowed_methods.clone())
        .allow_headers(policy.allowed_headers.clone())
}

/// MethodPolicy
///
/// State for [`reject_disallowed_methods`].
#[derive(Clone, Debug)]
pub struct MethodPolicy {
    allowed: Arc<[Method]>,
    allow_header: Arc<str>,
}

impl MethodPolicy {
    pub fn new(allowed: &[Method]) -> Self {
        let allow_header = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            allowed: allowed.into(),
            allow_header: allow_header.into(),
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        method == Method::OPTIONS || self.allowed.contains(method)
    }
}

/// reject_disallowed_methods
///
/// Answers `405 Method Not Allowed` for any method outside the policy.
pub async fn reject_disallowed_methods(
    State(policy): State<MethodPolicy>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !policy.allows(request.method()) {
        tracing::debug!(method = %request.method(), "method rejected");
        return Err(ApiError::MethodNotAllowed {
            allow: policy.allow_header.to_string(),
        });
    }
    Ok(next.run(request).await)
}

/// The parsed JSON body, stored in the request extensions for handlers.
#[derive(Clone, Debug)]
pub struct JsonBody(pub Arc<Value>);

/// Maximum JSON body size in bytes; state for [`parse_json_body`].
#[derive(Clone, Copy, Debug)]
pub struct JsonBodyLimit(pub usize);

/// parse_json_body
///
/// For `application/json` requests: buffers the body, parses it and stores
/// the value as a [`JsonBody`] extension. The bytes are put back so the
/// request can still be replayed by the dispatcher.
///
/// - empty body parses as `{}`
/// - only objects and arrays are accepted at the top level
/// - malformed JSON stops the request with `400`, oversize bodies with `413`
pub async fn parse_json_body(
    State(JsonBodyLimit(limit)): State<JsonBodyLimit>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_json(request.headers()) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > limit) {
        return Err(ApiError::PayloadTooLarge);
    }

    // Chunked bodies that overrun the limit fail here.
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;

    let value = parse_strict(&bytes)?;
    parts.extensions.insert(JsonBody(Arc::new(value)));

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn parse_strict(bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
        Ok(_) | Err(_) => Err(ApiError::MalformedJson),
    }
}

/// True when the content type is `application/json`, parameters ignored.
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Payload
///
/// Extractor handing a handler the request body, deserialized from the value
/// [`parse_json_body`] already produced. Requests without a JSON body are
/// seen as `{}`. A body of the wrong shape is rejected with `422`.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequestParts<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let parsed = match parts.extensions.get::<JsonBody>() {
            Some(JsonBody(value)) => T::deserialize(&**value),
            None => T::deserialize(&Value::Object(Default::default())),
        };

        parsed
            .map(Payload)
            .map_err(|e| ApiError::UnprocessableEntity(format!("invalid request body: {e}")))
    }
}
