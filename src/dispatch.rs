//! Prefix dispatch over an ordered table of collaborators.
//!
//! Each collaborator is an ordinary axum `Router` mounted under a prefix. A
//! request is offered to the collaborators whose prefix is the most specific
//! match for its path, in registration order, until one of them handles it.
//! A collaborator that has no route (or no method on a route) for the request
//! answers `NotMatched` and the next one is tried.

use std::sync::Arc;

use axum::{
    Extension, Router,
    body::{Body, Bytes},
    extract::{OriginalUri, Request, State},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;

use crate::{error::ApiError, middleware::JsonBody};

/// Dispatch
///
/// Outcome of offering a request to one collaborator. `Handled` carries the
/// collaborator's response, which is final even when it is an error status.
/// `NotMatched` means the collaborator has no route (or no handler for the
/// method) and the next candidate in the table should be tried.
#[derive(Debug)]
pub enum Dispatch {
    Handled(Response),
    NotMatched,
}

/// RouteNotMatched
///
/// Response extension marking a collaborator's "no route here" answer. Only
/// [`route_not_matched`] sets it, so a collaborator's own 404 is still final.
#[derive(Clone, Copy, Debug)]
pub struct RouteNotMatched;

/// Fallback installed on every mounted collaborator.
pub async fn route_not_matched() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Extension(RouteNotMatched))
}

/// Mount
///
/// One row of the route table: a named collaborator and the path prefix it is
/// mounted under. The wrapped router is given [`route_not_matched`] as both its
/// fallback and its method-not-allowed fallback when the row is created.
#[derive(Clone)]
pub struct Mount {
    name: &'static str,
    prefix: String,
    router: Router,
}

impl Mount {
    /// new
    ///
    /// Normalizes `prefix` to a leading slash and no trailing slash (`"api/"`
    /// becomes `"/api"`, an empty prefix becomes `"/"`). `name` only appears
    /// in logs.
    pub fn new(name: &'static str, prefix: &str, router: Router) -> Self {
        let trimmed = prefix.trim_end_matches('/');
        let prefix = if trimmed.is_empty() {
            "/".to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };

        Self {
            name,
            prefix,
            router: router
                .fallback(route_not_matched)
                .method_not_allowed_fallback(route_not_matched),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path as the collaborator sees it, or `None` when the prefix does not
    /// cover `path`. Matching is on whole segments.
    ///
    /// One trailing slash is dropped, so `/api/login/` reaches the `/login`
    /// route the same way `/api/login` does.
    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = if self.prefix == "/" {
            path
        } else {
            match path.strip_prefix(self.prefix.as_str())? {
                "" => "/",
                rest if rest.starts_with('/') => rest,
                _ => return None,
            }
        };

        match rest.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => Some(trimmed),
            _ => Some(rest),
        }
    }

    fn specificity(&self) -> usize {
        self.prefix.trim_end_matches('/').len()
    }

    async fn try_handle(&self, parts: &Parts, body: &Bytes) -> Result<Dispatch, ApiError> {
        let Some(rest) = self.strip(parts.uri.path()) else {
            return Ok(Dispatch::NotMatched);
        };

        let uri = match parts.uri.query() {
            Some(query) => format!("{rest}?{query}"),
            None => rest.to_string(),
        };
        let uri: Uri = uri
            .parse()
            .map_err(|e| ApiError::Internal(format!("rewritten uri rejected: {e}")))?;

        let mut request = Request::new(Body::from(body.clone()));
        *request.method_mut() = parts.method.clone();
        *request.uri_mut() = uri;
        *request.version_mut() = parts.version;
        *request.headers_mut() = parts.headers.clone();
        request
            .extensions_mut()
            .insert(OriginalUri(parts.uri.clone()));
        if let Some(json) = parts.extensions.get::<JsonBody>() {
            request.extensions_mut().insert(json.clone());
        }

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(infallible) => match infallible {},
        };

        if response.extensions().get::<RouteNotMatched>().is_some() {
            Ok(Dispatch::NotMatched)
        } else {
            Ok(Dispatch::Handled(response))
        }
    }
}

/// RouteTable
///
/// Insertion-ordered collaborators. Built once at startup, immutable after.
#[derive(Clone)]
pub struct RouteTable {
    mounts: Vec<Mount>,
    body_limit: usize,
}

impl RouteTable {
    /// `body_limit` bounds the buffer kept to replay a request to several collaborators.
    pub fn new(body_limit: usize) -> Self {
        Self {
            mounts: Vec::new(),
            body_limit,
        }
    }

    /// mount
    ///
    /// Appends a collaborator. Rows sharing a prefix are tried in the order
    /// they were mounted; a longer prefix always takes precedence over a
    /// shorter one, whatever the order.
    pub fn mount(mut self, name: &'static str, prefix: &str, router: Router) -> Self {
        self.mounts.push(Mount::new(name, prefix, router));
        self
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// candidates
    ///
    /// Collaborators eligible for `path`, in the order they are tried. Only the
    /// rows with the longest matching prefix are returned, so `/api/payment/x`
    /// never reaches a row mounted at `/api`.
    pub fn candidates<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Mount> + 'a {
        let best = self
            .mounts
            .iter()
            .filter(|mount| mount.strip(path).is_some())
            .map(Mount::specificity)
            .max();

        self.mounts.iter().filter(move |mount| {
            mount.strip(path).is_some() && Some(mount.specificity()) == best
        })
    }
}

/// dispatch
///
/// Gateway fallback: offers the request to each candidate in turn and returns
/// the first handled response, or `404` when nobody claims it.
pub async fn dispatch(
    State(table): State<Arc<RouteTable>>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, table.body_limit)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;

    for mount in table.candidates(parts.uri.path()) {
        match mount.try_handle(&parts, &body).await? {
            Dispatch::Handled(response) => {
                tracing::debug!(
                    collaborator = mount.name(),
                    status = %response.status(),
                    "request handled"
                );
                return Ok(response);
            }
            Dispatch::NotMatched => {
                tracing::trace!(collaborator = mount.name(), "no route, falling through");
            }
        }
    }

    Err(ApiError::NotFound)
}
