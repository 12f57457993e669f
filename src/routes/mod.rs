/// Router Module Index
///
/// The three collaborators the gateway mounts. Each is a plain `Router<AppState>`
/// that knows nothing about its mount prefix; the route table in `dispatch`
/// decides where it lives and in which order it is tried.

/// Greeting, health and documentation endpoints. Mounted at `/api`, tried first.
pub mod general;

/// Session issuance and inspection. Mounted at `/api`, tried after `general`.
pub mod auth;

/// Catalog, invoices and refunds. Mounted at `/api/payment`, which it owns exclusively.
pub mod payment;
