//! Shared helpers for integration tests.

#![allow(dead_code)]

use tempfile::TempDir;

use keygate::config::Config;
use keygate::crypto::hash_secret;
use keygate::db::{self, AppState, queries};
use keygate::jwt;
use keygate::models::Account;
use keygate::payments::PixClient;

pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const TEST_TOKEN_SECRET: &str = "test-token-secret";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_path: ":memory:".to_string(),
        base_url: "http://127.0.0.1:0".to_string(),
        dev_mode: true,
        token_secret: TEST_TOKEN_SECRET.to_string(),
        token_ttl_hours: 1,
        poll_interval_secs: 60,
        payment_staleness_hours: 24,
        hwid_reset_cooldown_days: 30,
        admin_reset_bypass: false,
        provider_base_url: "http://127.0.0.1:1".to_string(),
        provider_api_key: "test-api-key".to_string(),
        provider_webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
    }
}

/// Fresh state backed by a file database in a temp dir. The `TempDir` must
/// stay alive for the duration of the test.
pub fn create_test_state() -> (AppState, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("keygate.db");
    let pool = db::open_pool(path.to_str().expect("utf-8 path")).expect("open pool");
    db::init_schema(&pool.get().expect("get conn")).expect("init schema");

    let config = test_config();
    let provider = PixClient::new(&config);
    (
        AppState {
            db: pool,
            config,
            provider,
        },
        dir,
    )
}

pub fn create_test_account(state: &AppState, email: &str) -> Account {
    let conn = state.db.get().expect("get conn");
    queries::create_account(&conn, email, &hash_secret("hunter2hunter2"), false)
        .expect("create account")
}

pub fn create_test_admin(state: &AppState, email: &str) -> Account {
    let conn = state.db.get().expect("get conn");
    queries::create_account(&conn, email, &hash_secret("hunter2hunter2"), true)
        .expect("create admin")
}

pub fn session_token(state: &AppState, account_id: &str) -> String {
    jwt::sign_session_token(&state.config.token_secret, account_id, 1).expect("sign token")
}
