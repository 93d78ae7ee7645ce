use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use memestreak_types::api::Claims;

/// Lifetime of a website session token.
pub const TOKEN_LIFETIME_DAYS: i64 = 365;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(jsonwebtoken::errors::Error),

    #[error("token rejected: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Signs an HS256 token for `uid`, valid for `TOKEN_LIFETIME_DAYS` from `now`.
pub fn create_token(secret: &str, uid: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
    let claims = Claims {
        uid: uid.to_string(),
        exp: (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Sign)
}

/// Checks signature and expiry.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(TokenError::Invalid)
}
