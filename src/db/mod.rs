pub mod from_row;
pub mod queries;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::Config;
use crate::error::Result;
use crate::payments::PixClient;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Shared application state handed to every handler and the poller.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub provider: PixClient,
}

/// Open the connection pool. Every connection gets WAL mode (readers do not
/// block the reconciliation worker's writes), foreign keys, and a busy
/// timeout so competing writers queue instead of failing immediately.
pub fn open_pool(path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    Ok(r2d2::Pool::builder().build(manager)?)
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL
);

-- One mutable license record per account. `version` backs the
-- compare-and-swap write discipline; it bumps on every successful write.
CREATE TABLE IF NOT EXISTS license_records (
    account_id         TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
    status             TEXT NOT NULL DEFAULT 'none',
    plan               TEXT,
    expires_at         INTEGER,
    hardware_id        TEXT,
    last_hwid_reset_at INTEGER,
    version            INTEGER NOT NULL DEFAULT 0,
    updated_at         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS payment_records (
    id                 TEXT PRIMARY KEY,
    external_reference TEXT NOT NULL UNIQUE,
    account_id         TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    plan               TEXT NOT NULL,
    duration_days      INTEGER NOT NULL,
    amount_cents       INTEGER NOT NULL,
    status             TEXT NOT NULL DEFAULT 'pending',
    created_at         INTEGER NOT NULL,
    updated_at         INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_payment_records_pending
    ON payment_records(status, created_at);

-- Applied-extension set: one row per idempotency key that has already
-- driven a license extension. Inserted in the same transaction as the
-- license write, so re-delivery of a payment approval is a no-op.
CREATE TABLE IF NOT EXISTS license_extensions (
    idempotency_key TEXT PRIMARY KEY,
    account_id      TEXT NOT NULL,
    applied_at      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS activation_keys (
    id            TEXT PRIMARY KEY,
    key           TEXT NOT NULL UNIQUE,
    plan          TEXT NOT NULL,
    duration_days INTEGER NOT NULL,
    consumed_by   TEXT,
    consumed_at   INTEGER,
    created_at    INTEGER NOT NULL
);

-- Append-only. Enforcement of the reset cooldown reads
-- license_records.last_hwid_reset_at; this table is the audit trail.
CREATE TABLE IF NOT EXISTS hwid_reset_audit (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL,
    actor      TEXT NOT NULL,
    reason     TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_hwid_reset_audit_account
    ON hwid_reset_audit(account_id, created_at);
";

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
