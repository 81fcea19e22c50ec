//! Row-mapping helpers and canonical column lists.
//!
//! Every SELECT in `queries` names its columns through one of the `*_COLS`
//! constants so the `FromRow` impls and the SQL can never drift apart.

use rusqlite::{Connection, Row, ToSql};

use crate::error::Result;
use crate::models::*;

pub const ACCOUNT_COLS: &str = "id, email, password_hash, is_admin, created_at, updated_at";
pub const LICENSE_COLS: &str =
    "account_id, status, plan, expires_at, hardware_id, last_hwid_reset_at, version, updated_at";
pub const PAYMENT_COLS: &str = "id, external_reference, account_id, plan, duration_days, \
     amount_cents, status, created_at, updated_at";
pub const ACTIVATION_KEY_COLS: &str =
    "id, key, plan, duration_days, consumed_by, consumed_at, created_at";
pub const HWID_AUDIT_COLS: &str = "id, account_id, actor, reason, created_at";

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Parse a TEXT column into a strum-backed enum, surfacing bad stored values
/// as conversion failures instead of panicking.
fn parse_enum<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl FromRow for Account {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            is_admin: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for LicenseRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LicenseRecord {
            account_id: row.get(0)?,
            status: parse_enum(1, row.get(1)?)?,
            plan: row.get(2)?,
            expires_at: row.get(3)?,
            hardware_id: row.get(4)?,
            last_hwid_reset_at: row.get(5)?,
            version: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for PaymentRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PaymentRecord {
            id: row.get(0)?,
            external_reference: row.get(1)?,
            account_id: row.get(2)?,
            plan: row.get(3)?,
            duration_days: row.get(4)?,
            amount_cents: row.get(5)?,
            status: parse_enum(6, row.get(6)?)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for ActivationKey {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ActivationKey {
            id: row.get(0)?,
            key: row.get(1)?,
            plan: row.get(2)?,
            duration_days: row.get(3)?,
            consumed_by: row.get(4)?,
            consumed_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for HwidResetAudit {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(HwidResetAudit {
            id: row.get(0)?,
            account_id: row.get(1)?,
            actor: parse_enum(2, row.get(2)?)?,
            reason: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| T::from_row(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
