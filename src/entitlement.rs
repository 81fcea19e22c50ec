//! The entitlement engine: every mutation of a license record goes through
//! here, whether it originates from a request handler, the payment
//! reconciliation worker, or an admin override.
//!
//! Correctness model: the engine holds no locks. Each mutation reads the
//! record, computes the new state, and issues a version-guarded conditional
//! write (`queries::write_license`). A write that loses its race is retried
//! from the read step, up to [`MAX_WRITE_ATTEMPTS`] times. Mutations that
//! touch more than one table run their writes inside an IMMEDIATE
//! transaction so they land all-or-nothing.
//!
//! Every operation takes `now` as a parameter; callers pass
//! `queries::now()`. Expiry and cooldown behavior is therefore a pure
//! function of the record and the clock.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    ActivationKey, LicenseRecord, LicenseSnapshot, LicenseStatus, ResetActor,
};
use crate::util::{SECONDS_PER_DAY, days_remaining};

/// Bounded retry for conditional writes before giving up with
/// `EXTENSION_CONFLICT` / `CONCURRENT_MODIFICATION`.
pub const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Outcome of the hardware check performed on every heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwidCheck {
    /// No hardware was bound; the presented id is now the bound one.
    Bound,
    /// The presented id matches the bound one. No write happened.
    Verified,
    /// A different hardware id is bound. Hard denial; the caller must go
    /// through the explicit reset flow.
    Mismatch,
}

fn begin_immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

fn status_from_expiry(expires_at: Option<i64>, now: i64) -> LicenseStatus {
    match expires_at {
        None => LicenseStatus::None,
        Some(exp) if exp <= now => LicenseStatus::Expired,
        Some(_) => LicenseStatus::Active,
    }
}

/// Read-only evaluation of an account's license.
///
/// The effective status is recomputed from `expires_at` and `now`; the
/// stored status is lazily corrected when it disagrees (e.g. a record still
/// marked active after its expiry passed). The correction is best-effort: a
/// lost race just means the next read corrects it instead.
pub fn evaluate(conn: &Connection, account_id: &str, now: i64) -> Result<LicenseSnapshot> {
    let rec = queries::require_license_record(conn, account_id)?;
    let derived = rec.derived_status(now);

    if derived != rec.status {
        let mut corrected = rec.clone();
        corrected.status = derived;
        corrected.version = rec.version + 1;
        corrected.updated_at = now;
        if queries::write_license(conn, &corrected, rec.version)? {
            tracing::debug!(
                account_id,
                from = rec.status.as_ref(),
                to = derived.as_ref(),
                "lazily corrected stored license status"
            );
        }
    }

    Ok(LicenseSnapshot {
        status: derived,
        plan: rec.plan,
        expires_at: rec.expires_at,
        days_remaining: days_remaining(rec.expires_at, now),
        hwid: rec.hardware_id,
    })
}

/// What a single extension-write attempt did.
pub(crate) enum ExtensionWrite {
    Applied(LicenseRecord),
    /// The idempotency key had already driven an extension.
    AlreadyApplied,
    /// The version guard failed; the caller re-reads and retries.
    LostRace,
}

/// One attempt at recording an extension: marks the idempotency key as
/// applied and conditionally writes the new expiry. Runs against the
/// caller's transaction so it composes with other conditional writes
/// (payment approval, key consumption).
pub(crate) fn extension_write(
    tx: &Connection,
    rec: &LicenseRecord,
    plan: &str,
    duration_days: i64,
    idempotency_key: &str,
    now: i64,
) -> Result<ExtensionWrite> {
    if !queries::record_extension_applied(tx, idempotency_key, &rec.account_id, now)? {
        return Ok(ExtensionWrite::AlreadyApplied);
    }

    // Extending an active license adds onto the existing expiry; an expired
    // or fresh license starts from now. Remaining paid time is never lost.
    let base = rec.expires_at.map_or(now, |exp| exp.max(now));

    let mut updated = rec.clone();
    updated.expires_at = Some(base + duration_days * SECONDS_PER_DAY);
    updated.plan = Some(plan.to_string());
    // REVOKED is sticky: paid time accrues but access stays denied until an
    // admin clears the revocation.
    if updated.status != LicenseStatus::Revoked {
        updated.status = LicenseStatus::Active;
    }
    updated.version = rec.version + 1;
    updated.updated_at = now;

    if queries::write_license(tx, &updated, rec.version)? {
        Ok(ExtensionWrite::Applied(updated))
    } else {
        Ok(ExtensionWrite::LostRace)
    }
}

/// The single mutation point for adding time to a license.
///
/// Idempotent per `idempotency_key`: re-applying a key returns the current
/// record unchanged. This is what makes payment webhook re-delivery safe.
pub fn extend(
    conn: &Connection,
    account_id: &str,
    plan: &str,
    duration_days: i64,
    idempotency_key: &str,
    now: i64,
) -> Result<LicenseRecord> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let rec = queries::require_license_record(conn, account_id)?;

        let tx = begin_immediate(conn)?;
        match extension_write(&tx, &rec, plan, duration_days, idempotency_key, now)? {
            ExtensionWrite::Applied(updated) => {
                tx.commit()?;
                tracing::info!(
                    account_id,
                    plan,
                    duration_days,
                    idempotency_key,
                    expires_at = updated.expires_at,
                    "license extended"
                );
                return Ok(updated);
            }
            ExtensionWrite::AlreadyApplied => {
                drop(tx);
                tracing::info!(account_id, idempotency_key, "duplicate extension ignored");
                return queries::require_license_record(conn, account_id);
            }
            ExtensionWrite::LostRace => drop(tx),
        }
    }
    Err(AppError::ExtensionConflict)
}

/// Validate and consume a manually-issued activation key, extending the
/// license by the key's plan and duration. The consumption and the
/// extension land in one transaction: a key is either fully redeemed or not
/// touched at all.
pub fn activate_with_key(
    conn: &Connection,
    account_id: &str,
    code: &str,
    now: i64,
) -> Result<LicenseRecord> {
    if !ActivationKey::code_is_well_formed(code) {
        return Err(AppError::InvalidKey);
    }
    let key = queries::get_activation_key_by_code(conn, code)?.ok_or(AppError::InvalidKey)?;
    if key.consumed_at.is_some() {
        return Err(AppError::KeyAlreadyUsed);
    }
    let idempotency_key = format!("key:{}", key.id);

    for _ in 0..MAX_WRITE_ATTEMPTS {
        let rec = queries::require_license_record(conn, account_id)?;

        let tx = begin_immediate(conn)?;
        if !queries::consume_activation_key(&tx, &key.id, account_id, now)? {
            return Err(AppError::KeyAlreadyUsed);
        }
        match extension_write(&tx, &rec, &key.plan, key.duration_days, &idempotency_key, now)? {
            ExtensionWrite::Applied(updated) => {
                tx.commit()?;
                tracing::info!(
                    account_id,
                    key_id = %key.id,
                    plan = %key.plan,
                    "activation key redeemed"
                );
                return Ok(updated);
            }
            ExtensionWrite::AlreadyApplied => {
                // The key's extension already happened, so the key itself
                // must count as used; the consumption above rolls back.
                drop(tx);
                return Err(AppError::KeyAlreadyUsed);
            }
            ExtensionWrite::LostRace => drop(tx),
        }
    }
    Err(AppError::ExtensionConflict)
}

/// Bind the presented hardware id if none is bound, or verify it against
/// the bound one. A mismatch is a hard denial, never a silent rebind.
///
/// Read-only when the id is already bound and matches: the heartbeat hot
/// path does not write.
pub fn bind_or_verify_hwid(
    conn: &Connection,
    account_id: &str,
    presented_hwid: &str,
    now: i64,
) -> Result<HwidCheck> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let rec = queries::require_license_record(conn, account_id)?;

        match rec.hardware_id.as_deref() {
            Some(bound) if bound == presented_hwid => return Ok(HwidCheck::Verified),
            Some(_) => return Ok(HwidCheck::Mismatch),
            None => {
                let mut updated = rec.clone();
                updated.hardware_id = Some(presented_hwid.to_string());
                updated.version = rec.version + 1;
                updated.updated_at = now;
                if queries::write_license(conn, &updated, rec.version)? {
                    tracing::info!(account_id, "hardware id bound");
                    return Ok(HwidCheck::Bound);
                }
                // Lost the race; re-read. If the winner bound the same id
                // the next iteration verifies it.
            }
        }
    }
    Err(AppError::ConcurrentModification)
}

/// Clear the bound hardware id, gated to once per cooldown window.
///
/// On denial the error reports when the reset becomes available again.
/// `bypass_cooldown` is the explicit admin-override policy switch; both
/// actors share the gate when it is off.
pub fn reset_hwid(
    conn: &Connection,
    account_id: &str,
    reason: &str,
    actor: ResetActor,
    cooldown_days: i64,
    bypass_cooldown: bool,
    now: i64,
) -> Result<LicenseRecord> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let rec = queries::require_license_record(conn, account_id)?;

        if !bypass_cooldown
            && let Some(last) = rec.last_hwid_reset_at
        {
            let available_at = last + cooldown_days * SECONDS_PER_DAY;
            if available_at > now {
                return Err(AppError::ResetRateLimited { available_at });
            }
        }

        let mut updated = rec.clone();
        updated.hardware_id = None;
        updated.last_hwid_reset_at = Some(now);
        updated.version = rec.version + 1;
        updated.updated_at = now;

        let tx = begin_immediate(conn)?;
        queries::insert_hwid_reset_audit(&tx, account_id, actor, reason, now)?;
        if queries::write_license(&tx, &updated, rec.version)? {
            tx.commit()?;
            tracing::info!(account_id, actor = actor.as_ref(), reason, "hardware id reset");
            return Ok(updated);
        }
        drop(tx);
    }
    Err(AppError::ConcurrentModification)
}

/// Revoke a license. Sticky until `unrevoke`; the expiry keeps running.
pub fn revoke(conn: &Connection, account_id: &str, now: i64) -> Result<LicenseRecord> {
    mutate(conn, account_id, now, |updated| {
        updated.status = LicenseStatus::Revoked;
    })
    .inspect(|_| tracing::info!(account_id, "license revoked"))
}

/// Clear a revocation. The status falls back to whatever the expiry implies.
pub fn unrevoke(conn: &Connection, account_id: &str, now: i64) -> Result<LicenseRecord> {
    mutate(conn, account_id, now, |updated| {
        updated.status = status_from_expiry(updated.expires_at, now);
    })
    .inspect(|_| tracing::info!(account_id, "license revocation cleared"))
}

/// Admin override of the expiry timestamp. `None` clears the license back
/// to NONE. Revocation stays sticky across expiry changes.
pub fn admin_set_expiry(
    conn: &Connection,
    account_id: &str,
    new_expires_at: Option<i64>,
    now: i64,
) -> Result<LicenseRecord> {
    mutate(conn, account_id, now, |updated| {
        updated.expires_at = new_expires_at;
        if updated.status != LicenseStatus::Revoked {
            updated.status = status_from_expiry(new_expires_at, now);
        }
    })
    .inspect(|rec| tracing::info!(account_id, expires_at = rec.expires_at, "expiry overridden"))
}

/// Shared read-mutate-write loop for single-row mutations.
fn mutate(
    conn: &Connection,
    account_id: &str,
    now: i64,
    apply: impl Fn(&mut LicenseRecord),
) -> Result<LicenseRecord> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let rec = queries::require_license_record(conn, account_id)?;
        let mut updated = rec.clone();
        apply(&mut updated);
        updated.version = rec.version + 1;
        updated.updated_at = now;
        if queries::write_license(conn, &updated, rec.version)? {
            return Ok(updated);
        }
    }
    Err(AppError::ConcurrentModification)
}
