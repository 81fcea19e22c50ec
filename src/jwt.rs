//! Session token signing and verification.
//!
//! Tokens are short-lived HS256 JWTs carrying the account id as subject.
//! The account id is re-resolved against the database on every request, so
//! nothing beyond identity travels in the token.

use jwt_simple::prelude::*;

use crate::error::{AppError, Result};

pub fn sign_session_token(secret: &str, account_id: &str, ttl_hours: u64) -> Result<String> {
    let key = HS256Key::from_bytes(secret.as_bytes());
    let claims = Claims::create(Duration::from_hours(ttl_hours)).with_subject(account_id);
    key.authenticate(claims)
        .map_err(|e| AppError::Internal(format!("failed to sign session token: {e}")))
}

/// Verify a session token and return the account id it was issued for.
pub fn verify_session_token(secret: &str, token: &str) -> Result<String> {
    let key = HS256Key::from_bytes(secret.as_bytes());
    let claims = key
        .verify_token::<NoCustomClaims>(token, None)
        .map_err(|_| AppError::Unauthorized("invalid or expired session token".into()))?;
    claims
        .subject
        .ok_or_else(|| AppError::Unauthorized("session token has no subject".into()))
}
