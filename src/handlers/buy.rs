use axum::{Extension, extract::State};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AuthedAccount;
use crate::models::{PaymentStatus, Plan};

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct BuyResponse {
    pub payment_id: String,
    pub reference: String,
    pub plan: Plan,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    /// PIX QR payload and its copy-paste form; rendering is up to the
    /// storefront.
    pub qr_code: String,
    pub copy_paste: String,
}

/// Start a purchase: record the PENDING payment, then ask the provider for
/// a charge. The webhook or the poller completes it later.
pub async fn initiate_buy(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(request): Json<BuyRequest>,
) -> Result<Json<BuyResponse>> {
    let plan: Plan = request.plan.parse().map_err(|_| {
        let known: Vec<&str> = Plan::iter().map(|p| p.into()).collect();
        AppError::BadRequest(format!(
            "unknown plan '{}'; expected one of: {}",
            request.plan,
            known.join(", ")
        ))
    })?;

    let reference = Uuid::new_v4().to_string();
    let payment = {
        let conn = state.db.get()?;
        queries::create_payment(
            &conn,
            &account.id,
            &reference,
            plan.as_ref(),
            plan.duration_days(),
            plan.price_cents(),
        )?
    };

    let charge = state
        .provider
        .create_charge(
            &reference,
            payment.amount_cents,
            &format!("keygate {} license", plan.display_name()),
        )
        .await?;

    tracing::info!(
        account_id = %account.id,
        reference = %reference,
        plan = plan.as_ref(),
        amount_cents = payment.amount_cents,
        "purchase initiated"
    );

    Ok(Json(BuyResponse {
        payment_id: payment.id,
        reference,
        plan,
        amount_cents: payment.amount_cents,
        status: payment.status,
        qr_code: charge.qr_code,
        copy_paste: charge.copy_paste,
    }))
}
