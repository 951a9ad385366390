//! Admin authentication and one-time secrets.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PortalError;
use crate::state::AppState;

/// bcrypt work factor for new admin passwords.
pub const BCRYPT_COST: u32 = 12;

/// JWT payload of an admin session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Admin id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a session token for `admin_id`.
pub fn issue_token(secret: &str, admin_id: &str, ttl: Duration) -> Result<String, PortalError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: admin_id.to_string(),
        iat: now,
        exp: now + ttl.as_secs() as i64,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| PortalError::Internal(format!("failed to sign token: {e}")))
}

/// Verifies signature and expiry.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

pub fn hash_password(password: &str) -> Result<String, PortalError> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| PortalError::Internal(format!("failed to hash password: {e}")))
}

/// Compares against a bcrypt hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// 32 random bytes, hex encoded. Used for magic links.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Six-digit code, never starting with zero.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// An authenticated admin, extracted from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split_whitespace().nth(1))
            .ok_or_else(|| PortalError::Unauthorized("No token provided".to_string()))?;

        let claims = decode_token(&state.config.auth.jwt_secret, token)
            .map_err(|_| PortalError::Unauthorized("Invalid token".to_string()))?;

        Ok(AdminSession { admin_id: claims.sub })
    }
}
