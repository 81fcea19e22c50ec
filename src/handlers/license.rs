use axum::{Extension, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::entitlement::{self, HwidCheck};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AuthedAccount;
use crate::models::{LicenseSnapshot, LicenseStatus, ResetActor};
use crate::util::extract_request_info;

const MAX_HWID_LEN: usize = 128;

fn validate_hwid(hwid: &str) -> Result<()> {
    if hwid.is_empty()
        || hwid.len() > MAX_HWID_LEN
        || !hwid.bytes().all(|b| b.is_ascii_graphic())
    {
        return Err(AppError::BadRequest("malformed hardware id".into()));
    }
    Ok(())
}

pub async fn license_status(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<LicenseSnapshot>> {
    let conn = state.db.get()?;
    let snapshot = entitlement::evaluate(&conn, &account.id, queries::now())?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub hwid: String,
}

/// Reasons a heartbeat is denied. Machine-readable so the client can show
/// an actionable message (renew vs. unbind vs. buy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeartbeatDeny {
    NotLicensed,
    Expired,
    Revoked,
    HwidMismatch,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<HeartbeatDeny>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

impl HeartbeatResponse {
    fn deny(reason: HeartbeatDeny) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            days_remaining: None,
        }
    }
}

/// The per-use check the licensed client performs: evaluate, then bind or
/// verify the hardware id. Read-only on the steady-state success path.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(request): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>> {
    validate_hwid(&request.hwid)?;

    let conn = state.db.get()?;
    let now = queries::now();
    let snapshot = entitlement::evaluate(&conn, &account.id, now)?;

    let deny = match snapshot.status {
        LicenseStatus::None => Some(HeartbeatDeny::NotLicensed),
        LicenseStatus::Expired => Some(HeartbeatDeny::Expired),
        LicenseStatus::Revoked => Some(HeartbeatDeny::Revoked),
        LicenseStatus::Active => None,
    };
    if let Some(reason) = deny {
        return Ok(Json(HeartbeatResponse::deny(reason)));
    }

    match entitlement::bind_or_verify_hwid(&conn, &account.id, &request.hwid, now)? {
        HwidCheck::Bound | HwidCheck::Verified => Ok(Json(HeartbeatResponse {
            ok: true,
            reason: None,
            days_remaining: Some(snapshot.days_remaining),
        })),
        HwidCheck::Mismatch => Ok(Json(HeartbeatResponse::deny(HeartbeatDeny::HwidMismatch))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub key: String,
}

pub async fn activate(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<LicenseSnapshot>> {
    let conn = state.db.get()?;
    let now = queries::now();
    entitlement::activate_with_key(&conn, &account.id, request.key.trim(), now)?;
    Ok(Json(entitlement::evaluate(&conn, &account.id, now)?))
}

#[derive(Debug, Deserialize)]
pub struct ResetHwidRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn reset_hwid(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    headers: HeaderMap,
    Json(request): Json<ResetHwidRequest>,
) -> Result<Json<LicenseSnapshot>> {
    let reason = request
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("self-service reset")
        .to_string();

    let (ip, user_agent) = extract_request_info(&headers);
    tracing::info!(account_id = %account.id, ?ip, ?user_agent, "hardware reset requested");

    let conn = state.db.get()?;
    let now = queries::now();
    entitlement::reset_hwid(
        &conn,
        &account.id,
        &reason,
        ResetActor::SelfService,
        state.config.hwid_reset_cooldown_days,
        false,
        now,
    )?;
    Ok(Json(entitlement::evaluate(&conn, &account.id, now)?))
}
