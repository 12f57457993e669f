use std::{process::ExitCode, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unigram_payment_api::{
    AppState, InvoiceState, MockInvoiceService, TelegramInvoiceClient,
    config::{AppConfig, Env},
    server,
};

/// main
///
/// Loads configuration, initializes logging, picks the invoice provider and
/// runs the gateway. Any startup failure ends the process with a non-zero status.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Configuration. The .env file is loaded before anything reads the environment.
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Logging. RUST_LOG wins over the defaults. Logs go to stderr; stdout
    // only carries the startup line.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "unigram_payment_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Payment provider. Without a bot token (local only) invoices stay in-process.
    let invoices: InvoiceState = match config.bot_token.as_deref() {
        Some(token) => Arc::new(TelegramInvoiceClient::new(&config.telegram_api_base, token)),
        None => {
            tracing::warn!("BOT_TOKEN not set, invoices go to the in-process mock");
            Arc::new(MockInvoiceService::new())
        }
    };

    // 4. Gateway.
    let state = AppState { config, invoices };
    if let Err(e) = server::run(state).await {
        tracing::error!(error = %e, "gateway terminated");
        eprintln!("FATAL: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
