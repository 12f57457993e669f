use std::{env, time::Duration};

use axum::http::{HeaderName, Method, header};

/// Port used when `PORT` is unset or cannot be parsed.
pub const DEFAULT_PORT: u16 = 1000;

/// Fallback signing secret for local development sessions.
const LOCAL_JWT_SECRET: &str = "unigram-local-development-secret";

/// AppConfig
///
/// Holds the process configuration. Loaded once in `main` before anything else
/// runs and handed to the gateway by value; request handling never reads the
/// environment directly.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and the dev auth bypass.
    pub env: Env,
    // Listening port (all interfaces).
    pub port: u16,
    // Externally visible URL, printed verbatim in the startup line.
    pub server_domain: String,
    // HS256 secret for session tokens issued by the auth routes.
    pub jwt_secret: String,
    pub session_ttl: Duration,
    // Telegram bot token. `None` means invoices go to the in-process mock.
    pub bot_token: Option<String>,
    // Empty for Telegram Stars (XTR) invoices.
    pub provider_token: String,
    pub telegram_api_base: String,
    pub request_timeout: Duration,
    // Maximum accepted JSON body size in bytes.
    pub body_limit: usize,
    pub cors: CorsPolicy,
}

/// Env
///
/// Runtime context. `Local` enables development conveniences (pretty logs,
/// header-based auth bypass, mock invoices); `Production` demands every secret.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// CorsPolicy
///
/// The cross-origin rules applied to every request. Fixed at startup.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<HeaderName>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://vghosts.github.io".to_string(),
                "http://localhost:3000".to_string(),
            ],
            allowed_methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE],
            allowed_headers: vec![header::CONTENT_TYPE, header::AUTHORIZATION],
        }
    }
}

/// ConfigError
///
/// Raised by [`AppConfig::load`] before any socket is opened. `main` prints it
/// and exits non-zero, so a misconfigured deployment never serves traffic.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe values for tests: local env, mock invoices, default CORS policy.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: DEFAULT_PORT,
            server_domain: format!("http://localhost:{DEFAULT_PORT}"),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_ttl: Duration::from_secs(3600),
            bot_token: None,
            provider_token: String::new(),
            telegram_api_base: "https://api.telegram.org".to_string(),
            request_timeout: Duration::from_secs(30),
            body_limit: 100 * 1024,
            cors: CorsPolicy::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the process environment. Call
    /// `dotenv::dotenv()` first so a local `.env` file is honoured.
    ///
    /// `PORT` never fails: anything unparseable falls back to [`DEFAULT_PORT`].
    /// In production, `JWT_SECRET` and `BOT_TOKEN` are mandatory.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let env = match var("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let port = var("PORT")
            .and_then(|raw| raw.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let server_domain =
            var("SERVER_DOMAIN").unwrap_or_else(|| format!("http://localhost:{port}"));

        let jwt_secret = match (env, var("JWT_SECRET")) {
            (_, Some(secret)) => secret,
            (Env::Production, None) => return Err(ConfigError::Missing("JWT_SECRET")),
            (Env::Local, None) => defaults.jwt_secret,
        };

        let bot_token = var("BOT_TOKEN");
        if env == Env::Production && bot_token.is_none() {
            return Err(ConfigError::Missing("BOT_TOKEN"));
        }

        Ok(Self {
            env,
            port,
            server_domain,
            jwt_secret,
            session_ttl: secs("SESSION_TTL_SECS")?.unwrap_or(defaults.session_ttl),
            bot_token,
            provider_token: var("PAYMENT_PROVIDER_TOKEN").unwrap_or_default(),
            telegram_api_base: var("TELEGRAM_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.telegram_api_base),
            request_timeout: secs("REQUEST_TIMEOUT_SECS")?.unwrap_or(defaults.request_timeout),
            body_limit: parsed("JSON_BODY_LIMIT")?.unwrap_or(defaults.body_limit),
            cors: defaults.cors,
        })
    }
}

/// Non-empty environment variable.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { name, value: raw })
        })
        .transpose()
}

fn secs(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parsed::<u64>(name)?.map(Duration::from_secs))
}
