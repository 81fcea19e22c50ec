use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    ACCOUNT_COLS, ACTIVATION_KEY_COLS, HWID_AUDIT_COLS, LICENSE_COLS, PAYMENT_COLS, query_all,
    query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Accounts ============

/// Create an account together with its empty license record (status NONE).
/// The license record exists for the whole life of the account.
pub fn create_account(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    is_admin: bool,
) -> Result<Account> {
    let id = gen_id();
    let now = now();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO accounts (id, email, password_hash, is_admin, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, email, password_hash, is_admin, now, now],
    )?;
    tx.execute(
        "INSERT INTO license_records (account_id, status, version, updated_at)
         VALUES (?1, 'none', 0, ?2)",
        params![&id, now],
    )?;
    tx.commit()?;

    Ok(Account {
        id,
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        is_admin,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&id],
    )
}

pub fn get_account_by_email(conn: &Connection, email: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE email = ?1", ACCOUNT_COLS),
        &[&email],
    )
}

pub fn promote_to_admin(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE accounts SET is_admin = 1, updated_at = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

// ============ License records ============

pub fn get_license_record(conn: &Connection, account_id: &str) -> Result<Option<LicenseRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_records WHERE account_id = ?1",
            LICENSE_COLS
        ),
        &[&account_id],
    )
}

/// Conditional write of a whole license record, keyed on the version the
/// caller read. Returns false when the row moved underneath the caller, who
/// must then re-read and retry. `rec.version` and `rec.updated_at` must
/// already hold the post-write values.
pub fn write_license(conn: &Connection, rec: &LicenseRecord, expected_version: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE license_records
         SET status = ?1, plan = ?2, expires_at = ?3, hardware_id = ?4,
             last_hwid_reset_at = ?5, version = ?6, updated_at = ?7
         WHERE account_id = ?8 AND version = ?9",
        params![
            rec.status.as_ref(),
            rec.plan,
            rec.expires_at,
            rec.hardware_id,
            rec.last_hwid_reset_at,
            rec.version,
            rec.updated_at,
            rec.account_id,
            expected_version,
        ],
    )?;
    Ok(affected > 0)
}

/// Record an idempotency key as applied. Returns false if the key was
/// already present (the extension has already happened).
pub fn record_extension_applied(
    conn: &Connection,
    idempotency_key: &str,
    account_id: &str,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO license_extensions (idempotency_key, account_id, applied_at)
         VALUES (?1, ?2, ?3)",
        params![idempotency_key, account_id, now],
    )?;
    Ok(affected > 0)
}

// ============ Payment records ============

pub fn create_payment(
    conn: &Connection,
    account_id: &str,
    external_reference: &str,
    plan: &str,
    duration_days: i64,
    amount_cents: i64,
) -> Result<PaymentRecord> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO payment_records
         (id, external_reference, account_id, plan, duration_days, amount_cents,
          status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8)",
        params![
            &id,
            external_reference,
            account_id,
            plan,
            duration_days,
            amount_cents,
            now,
            now
        ],
    )?;

    Ok(PaymentRecord {
        id,
        external_reference: external_reference.to_string(),
        account_id: account_id.to_string(),
        plan: plan.to_string(),
        duration_days,
        amount_cents,
        status: PaymentStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_payment_by_reference(
    conn: &Connection,
    external_reference: &str,
) -> Result<Option<PaymentRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_records WHERE external_reference = ?1",
            PAYMENT_COLS
        ),
        &[&external_reference],
    )
}

pub fn list_pending_payments(conn: &Connection) -> Result<Vec<PaymentRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_records WHERE status = 'pending' ORDER BY created_at",
            PAYMENT_COLS
        ),
        &[],
    )
}

/// PENDING is the only non-terminal payment state; this is the gate that
/// lets webhook and poller race on the same reference without both firing.
pub fn mark_payment_if_pending(
    conn: &Connection,
    id: &str,
    new_status: PaymentStatus,
    now: i64,
) -> Result<bool> {
    debug_assert!(new_status.is_terminal());
    let affected = conn.execute(
        "UPDATE payment_records SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![new_status.as_ref(), now, id],
    )?;
    Ok(affected > 0)
}

/// Sweep payments that sat PENDING past the staleness cutoff into EXPIRED,
/// removing them from the polling set. Returns the number swept.
pub fn expire_stale_payments(conn: &Connection, cutoff: i64, now: i64) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE payment_records SET status = 'expired', updated_at = ?1
         WHERE status = 'pending' AND created_at < ?2",
        params![now, cutoff],
    )?;
    Ok(affected)
}

// ============ Activation keys ============

pub fn create_activation_key(
    conn: &Connection,
    plan: &str,
    duration_days: i64,
) -> Result<ActivationKey> {
    let id = gen_id();
    let code = ActivationKey::generate_code();
    let now = now();

    conn.execute(
        "INSERT INTO activation_keys (id, key, plan, duration_days, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, &code, plan, duration_days, now],
    )?;

    Ok(ActivationKey {
        id,
        key: code,
        plan: plan.to_string(),
        duration_days,
        consumed_by: None,
        consumed_at: None,
        created_at: now,
    })
}

pub fn get_activation_key_by_code(conn: &Connection, code: &str) -> Result<Option<ActivationKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM activation_keys WHERE key = ?1",
            ACTIVATION_KEY_COLS
        ),
        &[&code],
    )
}

/// Consume a key exactly once. Returns false if some other activation got
/// there first.
pub fn consume_activation_key(
    conn: &Connection,
    key_id: &str,
    account_id: &str,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE activation_keys SET consumed_by = ?1, consumed_at = ?2
         WHERE id = ?3 AND consumed_at IS NULL",
        params![account_id, now, key_id],
    )?;
    Ok(affected > 0)
}

// ============ Hardware reset audit ============

pub fn insert_hwid_reset_audit(
    conn: &Connection,
    account_id: &str,
    actor: ResetActor,
    reason: &str,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO hwid_reset_audit (account_id, actor, reason, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![account_id, actor.as_ref(), reason, now],
    )?;
    Ok(())
}

pub fn list_hwid_reset_audit(conn: &Connection, account_id: &str) -> Result<Vec<HwidResetAudit>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM hwid_reset_audit WHERE account_id = ?1 ORDER BY created_at",
            HWID_AUDIT_COLS
        ),
        &[&account_id],
    )
}

/// Fetch the license record for an account that must exist. A missing record
/// for a live account means the registration invariant was violated.
pub fn require_license_record(conn: &Connection, account_id: &str) -> Result<LicenseRecord> {
    get_license_record(conn, account_id)?.ok_or_else(|| {
        AppError::Internal(format!("license record missing for account {account_id}"))
    })
}
