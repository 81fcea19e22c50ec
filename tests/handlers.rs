//! HTTP-level tests: auth, the heartbeat gate's deny reasons, activation,
//! hardware reset, admin overrides, and the payment webhook.

mod common;
use common::*;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use tower::ServiceExt;

use keygate::db::queries;
use keygate::entitlement;
use keygate::handlers::router;

const DAY: i64 = 86400;

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn webhook_signature(body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn health_works() {
    let (state, _dir) = create_test_state();
    let app = router(state);

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_roundtrip() {
    let (state, _dir) = create_test_state();
    let app = router(state);

    let creds = json!({"email": "User@Example.COM", "password": "hunter2hunter2"});
    let (status, body) = send(&app, "POST", "/auth/register", None, Some(creds)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    // Same address, different case: already taken.
    let dup = json!({"email": "user@example.com", "password": "hunter2hunter2"});
    let (status, _) = send(&app, "POST", "/auth/register", None, Some(dup.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/auth/login", None, Some(dup)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let wrong = json!({"email": "user@example.com", "password": "wrong-password"});
    let (status, body) = send(&app, "POST", "/auth/login", None, Some(wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn license_endpoints_require_auth() {
    let (state, _dir) = create_test_state();
    let app = router(state);

    let (status, _) = send(&app, "GET", "/license/status", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some("not-a-real-token"),
        Some(json!({"hwid": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn heartbeat_denies_unlicensed_account() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "h@example.com");
    let token = session_token(&state, &account.id);
    let app = router(state);

    let (status, body) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some(&token),
        Some(json!({"hwid": "machine-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "NOT_LICENSED");
}

#[tokio::test]
async fn heartbeat_binds_then_rejects_other_machine() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "h@example.com");
    let token = session_token(&state, &account.id);
    {
        let conn = state.db.get().unwrap();
        entitlement::extend(&conn, &account.id, "weekly", 7, "ref-1", queries::now()).unwrap();
    }
    let app = router(state);

    let (status, body) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some(&token),
        Some(json!({"hwid": "machine-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["days_remaining"], 7);

    // Same machine keeps passing; a different one is denied.
    let (_, body) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some(&token),
        Some(json!({"hwid": "machine-a"})),
    )
    .await;
    assert_eq!(body["ok"], true);

    let (status, body) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some(&token),
        Some(json!({"hwid": "machine-b"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "HWID_MISMATCH");
}

#[tokio::test]
async fn heartbeat_reports_expiry_and_revocation() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "h@example.com");
    let token = session_token(&state, &account.id);
    {
        let conn = state.db.get().unwrap();
        // Expired yesterday.
        entitlement::admin_set_expiry(&conn, &account.id, Some(queries::now() - DAY), queries::now())
            .unwrap();
    }
    let app = router(state.clone());

    let (_, body) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some(&token),
        Some(json!({"hwid": "machine-a"})),
    )
    .await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "EXPIRED");

    {
        let conn = state.db.get().unwrap();
        entitlement::revoke(&conn, &account.id, queries::now()).unwrap();
    }
    let (_, body) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some(&token),
        Some(json!({"hwid": "machine-a"})),
    )
    .await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "REVOKED");
}

#[tokio::test]
async fn heartbeat_rejects_malformed_hwid() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "h@example.com");
    let token = session_token(&state, &account.id);
    let app = router(state);

    let (status, body) = send(
        &app,
        "POST",
        "/license/heartbeat",
        Some(&token),
        Some(json!({"hwid": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn status_reflects_active_license() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "s@example.com");
    let token = session_token(&state, &account.id);
    {
        let conn = state.db.get().unwrap();
        entitlement::extend(&conn, &account.id, "monthly", 30, "ref-1", queries::now()).unwrap();
    }
    let app = router(state);

    let (status, body) = send(&app, "GET", "/license/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["plan"], "monthly");
    assert_eq!(body["days_remaining"], 30);
}

#[tokio::test]
async fn activate_consumes_key_once() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "k@example.com");
    let token = session_token(&state, &account.id);
    let key = {
        let conn = state.db.get().unwrap();
        queries::create_activation_key(&conn, "weekly", 7).unwrap()
    };
    let app = router(state);

    let (status, body) = send(
        &app,
        "POST",
        "/license/activate",
        Some(&token),
        Some(json!({"key": key.key})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let (status, body) = send(
        &app,
        "POST",
        "/license/activate",
        Some(&token),
        Some(json!({"key": key.key})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "KEY_ALREADY_USED");

    let (status, body) = send(
        &app,
        "POST",
        "/license/activate",
        Some(&token),
        Some(json!({"key": "garbage"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_KEY");
}

#[tokio::test]
async fn reset_hwid_is_rate_limited() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "r@example.com");
    let token = session_token(&state, &account.id);
    {
        let conn = state.db.get().unwrap();
        entitlement::extend(&conn, &account.id, "weekly", 7, "ref-1", queries::now()).unwrap();
        entitlement::bind_or_verify_hwid(&conn, &account.id, "machine-a", queries::now()).unwrap();
    }
    let app = router(state);

    let (status, body) = send(
        &app,
        "POST",
        "/license/reset-hwid",
        Some(&token),
        Some(json!({"reason": "new pc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hwid"], Value::Null);

    let (status, body) = send(
        &app,
        "POST",
        "/license/reset-hwid",
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RESET_RATE_LIMITED");
    assert!(body["available_at"].is_i64());
}

#[tokio::test]
async fn admin_endpoint_requires_admin_flag() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "user@example.com");
    let token = session_token(&state, &account.id);
    let app = router(state);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/admin/license/{}", account.id),
        Some(&token),
        Some(json!({"action": "revoke"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_actions_drive_the_license() {
    let (state, _dir) = create_test_state();
    let admin = create_test_admin(&state, "admin@example.com");
    let user = create_test_account(&state, "user@example.com");
    let admin_token = session_token(&state, &admin.id);
    let app = router(state);

    let uri = format!("/admin/license/{}", user.id);

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(&admin_token),
        Some(json!({"action": "extend", "plan": "monthly"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["days_remaining"], 30);

    let (_, body) = send(
        &app,
        "POST",
        &uri,
        Some(&admin_token),
        Some(json!({"action": "revoke"})),
    )
    .await;
    assert_eq!(body["status"], "revoked");

    let (_, body) = send(
        &app,
        "POST",
        &uri,
        Some(&admin_token),
        Some(json!({"action": "unrevoke"})),
    )
    .await;
    assert_eq!(body["status"], "active");

    let (status, _) = send(
        &app,
        "POST",
        "/admin/license/nonexistent-account",
        Some(&admin_token),
        Some(json!({"action": "revoke"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_verifies_signature_and_extends_once() {
    let (state, _dir) = create_test_state();
    let account = create_test_account(&state, "w@example.com");
    {
        let conn = state.db.get().unwrap();
        queries::create_payment(&conn, &account.id, "ref-wh-1", "weekly", 7, 990).unwrap();
    }
    let app = router(state.clone());

    let payload = json!({
        "externalReference": "ref-wh-1",
        "status": "approved",
        "amount": 990
    })
    .to_string();

    // Wrong signature first: rejected, nothing happens.
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json")
        .header("x-signature", webhook_signature("different-body"))
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json")
        .header("x-signature", webhook_signature(&payload))
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    {
        let conn = state.db.get().unwrap();
        let rec = queries::require_license_record(&conn, &account.id).unwrap();
        assert!(rec.expires_at.is_some());
        let exp = rec.expires_at.unwrap();

        // Re-delivery: accepted with 200 (so the provider stops retrying)
        // but the expiry does not move.
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/payment")
            .header("content-type", "application/json")
            .header("x-signature", webhook_signature(&payload))
            .body(Body::from(payload.clone()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let rec = queries::require_license_record(&conn, &account.id).unwrap();
        assert_eq!(rec.expires_at, Some(exp));
    }

    // Unknown reference is rejected outright.
    let payload = json!({"externalReference": "no-such", "status": "approved"}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json")
        .header("x-signature", webhook_signature(&payload))
        .body(Body::from(payload))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
