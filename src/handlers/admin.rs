use axum::{
    Extension,
    extract::{Path, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{AppState, queries};
use crate::entitlement;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AuthedAccount;
use crate::models::{LicenseSnapshot, Plan, ResetActor};

/// Privileged direct mutations. Each goes through the same engine paths as
/// the automated actors, so an admin action cannot race a payment
/// extension into a lost update.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    Extend {
        plan: String,
        #[serde(default)]
        duration_days: Option<i64>,
    },
    Revoke,
    Unrevoke,
    SetExpiry {
        expires_at: Option<i64>,
    },
    ResetHwid {
        #[serde(default)]
        reason: Option<String>,
    },
}

pub async fn admin_license_action(
    State(state): State<AppState>,
    Extension(AuthedAccount(admin)): Extension<AuthedAccount>,
    Path(account_id): Path<String>,
    Json(action): Json<AdminAction>,
) -> Result<Json<LicenseSnapshot>> {
    let conn = state.db.get()?;
    let now = queries::now();

    queries::get_account_by_id(&conn, &account_id)?
        .ok_or_else(|| AppError::NotFound("account not found".into()))?;

    match action {
        AdminAction::Extend {
            plan,
            duration_days,
        } => {
            let plan: Plan = plan
                .parse()
                .map_err(|_| AppError::BadRequest(format!("unknown plan '{plan}'")))?;
            let duration = duration_days.unwrap_or_else(|| plan.duration_days());
            if duration <= 0 {
                return Err(AppError::BadRequest("duration must be positive".into()));
            }
            // Manual extensions are deliberate one-offs, so each gets a
            // fresh idempotency key.
            let idempotency_key = format!("admin:{}", Uuid::new_v4());
            entitlement::extend(&conn, &account_id, plan.as_ref(), duration, &idempotency_key, now)?;
            tracing::info!(admin = %admin.id, account_id = %account_id, duration, "admin extension");
        }
        AdminAction::Revoke => {
            entitlement::revoke(&conn, &account_id, now)?;
            tracing::info!(admin = %admin.id, account_id = %account_id, "admin revoke");
        }
        AdminAction::Unrevoke => {
            entitlement::unrevoke(&conn, &account_id, now)?;
            tracing::info!(admin = %admin.id, account_id = %account_id, "admin unrevoke");
        }
        AdminAction::SetExpiry { expires_at } => {
            entitlement::admin_set_expiry(&conn, &account_id, expires_at, now)?;
            tracing::info!(admin = %admin.id, account_id = %account_id, ?expires_at, "admin set expiry");
        }
        AdminAction::ResetHwid { reason } => {
            let reason = reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or("admin-forced reset")
                .to_string();
            entitlement::reset_hwid(
                &conn,
                &account_id,
                &reason,
                ResetActor::Admin,
                state.config.hwid_reset_cooldown_days,
                state.config.admin_reset_bypass,
                now,
            )?;
            tracing::info!(admin = %admin.id, account_id = %account_id, "admin hardware reset");
        }
    }

    Ok(Json(entitlement::evaluate(&conn, &account_id, now)?))
}
