use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::db::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::payments::ProviderNotice;
use crate::reconcile::{self, ReconcileOutcome};

/// Provider webhook: the push half of payment reconciliation. The payload
/// is untrusted until the signature checks out and the reference resolves
/// to a stored PENDING payment; the poller applying the same update first
/// makes this a no-op, and vice versa.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = match headers.get("x-signature").and_then(|v| v.to_str().ok()) {
        Some(sig) => sig,
        None => return (StatusCode::BAD_REQUEST, "Missing x-signature header"),
    };

    if !state.provider.verify_webhook_signature(&body, signature) {
        tracing::warn!("webhook signature verification failed");
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let notice: ProviderNotice = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse payment webhook");
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "db connection error");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match reconcile::apply_provider_update(&conn, &notice, queries::now()) {
        Ok(ReconcileOutcome::Extended(_)) => (StatusCode::OK, "OK"),
        Ok(ReconcileOutcome::Closed(_)) => (StatusCode::OK, "OK"),
        Ok(ReconcileOutcome::StillPending) => (StatusCode::OK, "Still pending"),
        Ok(ReconcileOutcome::AlreadyFinal) => (StatusCode::OK, "Already processed"),
        Err(AppError::NotFound(_)) => {
            tracing::warn!(reference = %notice.external_reference, "webhook for unknown reference");
            (StatusCode::NOT_FOUND, "Unknown payment reference")
        }
        Err(AppError::BadRequest(_)) => {
            tracing::warn!(reference = %notice.external_reference, "webhook failed validation");
            (StatusCode::BAD_REQUEST, "Payload does not match payment")
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to apply webhook update");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process update")
        }
    }
}
