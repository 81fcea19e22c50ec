use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::crypto::{hash_secret, verify_secret};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::jwt;
use crate::util::normalize_email;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub account_id: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>> {
    let email = normalize_email(&request.email);
    if !email.contains('@') {
        return Err(AppError::BadRequest("invalid email address".into()));
    }
    if request.password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }

    let conn = state.db.get()?;
    if queries::get_account_by_email(&conn, &email)?.is_some() {
        return Err(AppError::BadRequest("email already registered".into()));
    }

    let account = queries::create_account(&conn, &email, &hash_secret(&request.password), false)?;
    tracing::info!(account_id = %account.id, "account registered");

    let token = jwt::sign_session_token(
        &state.config.token_secret,
        &account.id,
        state.config.token_ttl_hours,
    )?;
    Ok(Json(AuthResponse {
        token,
        account_id: account.id,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>> {
    let email = normalize_email(&request.email);
    let conn = state.db.get()?;

    // Same error for unknown email and wrong password.
    let invalid = || AppError::Unauthorized("invalid credentials".into());

    let account = queries::get_account_by_email(&conn, &email)?.ok_or_else(invalid)?;
    if !verify_secret(&request.password, &account.password_hash) {
        return Err(invalid());
    }

    let token = jwt::sign_session_token(
        &state.config.token_secret,
        &account.id,
        state.config.token_ttl_hours,
    )?;
    Ok(Json(AuthResponse {
        token,
        account_id: account.id,
    }))
}
