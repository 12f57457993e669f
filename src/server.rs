//! Listener lifecycle: bind, announce, serve until a shutdown signal.

use std::net::Ipv4Addr;

use axum::Router;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::net::TcpListener;

use crate::{AppState, config::AppConfig, create_router};

/// StartupError
///
/// Fatal errors of the listener lifecycle. `main` logs them and exits with a
/// non-zero status; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The port could not be bound (in use, or privileged without the right
    /// capabilities). Raised before the startup line is printed.
    #[error("failed to bind 0.0.0.0:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed after startup.
    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// bind
///
/// Binds the listening socket on all interfaces. Port `0` asks the OS for a
/// free port, which `serve` then reports in the startup line.
pub async fn bind(port: u16) -> Result<TcpListener, StartupError> {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .map_err(|source| StartupError::Bind { port, source })
}

/// startup_banner
///
/// The single line written to stdout once the listener is up.
pub fn startup_banner(at: DateTime<Utc>, domain: &str, port: u16) -> String {
    format!(
        "[{}] Unigram Payment API running at {}, with port: {}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        domain,
        port
    )
}

/// serve
///
/// Prints the startup banner and serves `app` on `listener` until Ctrl-C or
/// SIGTERM, then drains in-flight requests.
pub async fn serve(listener: TcpListener, app: Router, config: &AppConfig) -> Result<(), StartupError> {
    let port = listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(config.port);

    println!("{}", startup_banner(Utc::now(), &config.server_domain, port));
    tracing::info!(port, domain = %config.server_domain, env = ?config.env, "HTTP server bound");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// run
///
/// Binds the configured port and serves the gateway. A bind failure is
/// returned before anything is printed.
pub async fn run(state: AppState) -> Result<(), StartupError> {
    let config = state.config.clone();
    let listener = bind(config.port).await?;
    serve(listener, create_router(state), &config).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
