use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::SessionToken,
};

/// Header accepted in `Env::Local` instead of a bearer token.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Claims
///
/// Payload of a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the player id, as a decimal string.
    pub sub: String,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Token id (jti). Unique per login.
    pub jti: Uuid,
    /// Chat the player logged in from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
}

/// issue_session
///
/// Signs a session for `player_id` that expires after the configured TTL.
pub fn issue_session(
    config: &AppConfig,
    player_id: i64,
    chat_id: Option<i64>,
) -> Result<SessionToken, ApiError> {
    let now = Utc::now();
    let ttl = chrono::Duration::from_std(config.session_ttl)
        .map_err(|e| ApiError::Internal(format!("session ttl out of range: {e}")))?;
    let expires_at = now + ttl;

    let claims = Claims {
        sub: player_id.to_string(),
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
        jti: Uuid::new_v4(),
        chat_id,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign session: {e}")))?;

    Ok(SessionToken {
        token,
        token_type: "Bearer".to_string(),
        expires_at,
    })
}

/// verify_session
///
/// Checks signature and expiry and returns the decoded claims.
pub fn verify_session(config: &AppConfig, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "session token rejected");
        ApiError::Unauthorized
    })
}

/// AuthPlayer
///
/// The identity resolved from an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthPlayer {
    pub player_id: i64,
    /// `None` when the request came through the local header bypass.
    pub expires_at: Option<DateTime<Utc>>,
}

/// AuthPlayer Extractor Implementation
///
/// Usable as a handler argument on any collaborator whose state provides an
/// `AppConfig`. Rejects with `401 Unauthorized` on any failure.
impl<S> FromRequestParts<S> for AuthPlayer
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        // Local development bypass. Production always falls through to the token check.
        if config.env == Env::Local {
            let bypass = parts
                .headers
                .get(PLAYER_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<i64>().ok());
            if let Some(player_id) = bypass {
                return Ok(AuthPlayer {
                    player_id,
                    expires_at: None,
                });
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = verify_session(&config, token)?;
        let player_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthPlayer {
            player_id,
            expires_at: Utc.timestamp_opt(claims.exp as i64, 0).single(),
        })
    }
}
