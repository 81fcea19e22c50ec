//! Payment reconciliation: bridges provider status updates into license
//! extensions.
//!
//! Two producers feed this module: the webhook handler (push) and the
//! polling loop below (pull). Both normalize into a [`ProviderNotice`] and
//! go through [`apply_provider_update`], whose PENDING-guarded conditional
//! update ensures a racing webhook and poller cannot both fire for the same
//! reference. The payment transition and its license extension commit in
//! one transaction, so an APPROVED payment can never be stranded without
//! its extension.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::{AppState, queries};
use crate::entitlement::{self, ExtensionWrite, MAX_WRITE_ATTEMPTS};
use crate::error::{AppError, Result};
use crate::models::{LicenseRecord, PaymentStatus};
use crate::payments::{ProviderChargeStatus, ProviderNotice};

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Payment approved and the license extended (exactly once).
    Extended(LicenseRecord),
    /// Payment moved to a non-approved terminal state; no license action.
    Closed(PaymentStatus),
    /// Provider still reports the charge as pending.
    StillPending,
    /// The payment was already terminal; the update is a no-op.
    AlreadyFinal,
}

/// Apply one provider status update against the stored payment record.
///
/// The notice is untrusted: the reference must resolve to a stored record,
/// a claimed amount must match the quoted one, and the stored plan and
/// duration drive the extension regardless of what the payload says.
pub fn apply_provider_update(
    conn: &Connection,
    notice: &ProviderNotice,
    now: i64,
) -> Result<ReconcileOutcome> {
    let payment = queries::get_payment_by_reference(conn, &notice.external_reference)?
        .ok_or_else(|| AppError::NotFound("unknown payment reference".into()))?;

    if let Some(amount) = notice.amount_cents
        && amount != payment.amount_cents
    {
        return Err(AppError::BadRequest(format!(
            "amount mismatch for payment reference {}",
            payment.external_reference
        )));
    }

    match notice.status {
        ProviderChargeStatus::Pending => Ok(ReconcileOutcome::StillPending),
        ProviderChargeStatus::Approved => {
            for _ in 0..MAX_WRITE_ATTEMPTS {
                let rec = queries::require_license_record(conn, &payment.account_id)?;

                let tx =
                    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
                if !queries::mark_payment_if_pending(
                    &tx,
                    &payment.id,
                    PaymentStatus::Approved,
                    now,
                )? {
                    return Ok(ReconcileOutcome::AlreadyFinal);
                }
                match entitlement::extension_write(
                    &tx,
                    &rec,
                    &payment.plan,
                    payment.duration_days,
                    &payment.external_reference,
                    now,
                )? {
                    ExtensionWrite::Applied(updated) => {
                        tx.commit()?;
                        tracing::info!(
                            reference = %payment.external_reference,
                            account_id = %payment.account_id,
                            plan = %payment.plan,
                            expires_at = updated.expires_at,
                            "payment approved, license extended"
                        );
                        return Ok(ReconcileOutcome::Extended(updated));
                    }
                    ExtensionWrite::AlreadyApplied => {
                        // The reference already drove an extension; commit
                        // the PENDING -> APPROVED transition without a
                        // second extension.
                        tx.commit()?;
                        return Ok(ReconcileOutcome::AlreadyFinal);
                    }
                    ExtensionWrite::LostRace => drop(tx),
                }
            }
            Err(AppError::ExtensionConflict)
        }
        ProviderChargeStatus::Rejected | ProviderChargeStatus::Cancelled => {
            if queries::mark_payment_if_pending(conn, &payment.id, PaymentStatus::Rejected, now)? {
                tracing::info!(reference = %payment.external_reference, "payment rejected");
                Ok(ReconcileOutcome::Closed(PaymentStatus::Rejected))
            } else {
                Ok(ReconcileOutcome::AlreadyFinal)
            }
        }
        ProviderChargeStatus::Expired => {
            if queries::mark_payment_if_pending(conn, &payment.id, PaymentStatus::Expired, now)? {
                tracing::info!(reference = %payment.external_reference, "payment expired at provider");
                Ok(ReconcileOutcome::Closed(PaymentStatus::Expired))
            } else {
                Ok(ReconcileOutcome::AlreadyFinal)
            }
        }
    }
}

/// Background polling loop: queries provider status for every payment still
/// PENDING, on a fixed interval, independent of request handling.
pub async fn run_poller(state: AppState) {
    let interval = std::time::Duration::from_secs(state.config.poll_interval_secs);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!(interval_secs = state.config.poll_interval_secs, "payment poller started");

    loop {
        ticker.tick().await;
        if let Err(e) = poll_once(&state).await {
            // Transient by definition; the next tick retries from scratch.
            tracing::warn!(error = %e, "payment poll tick failed");
        }
    }
}

/// One polling pass: sweep stale PENDING payments to EXPIRED, then query
/// the provider for the rest. Provider errors on a single payment never
/// transition it and never abort the pass.
pub async fn poll_once(state: &AppState) -> Result<()> {
    let now = queries::now();
    let pending = {
        let conn = state.db.get()?;
        let cutoff = now - state.config.payment_staleness_hours * 3600;
        let swept = queries::expire_stale_payments(&conn, cutoff, now)?;
        if swept > 0 {
            tracing::info!(swept, "expired stale pending payments");
        }
        queries::list_pending_payments(&conn)?
    };

    for payment in pending {
        let status = match state.provider.charge_status(&payment.external_reference).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    reference = %payment.external_reference,
                    error = %e,
                    "provider status query failed; retrying next tick"
                );
                continue;
            }
        };

        let notice = ProviderNotice {
            external_reference: payment.external_reference.clone(),
            status,
            amount_cents: None,
            plan: None,
            duration_days: None,
        };
        let conn = state.db.get()?;
        if let Err(e) = apply_provider_update(&conn, &notice, queries::now()) {
            tracing::warn!(
                reference = %payment.external_reference,
                error = %e,
                "failed to apply provider update"
            );
        }
    }
    Ok(())
}
