mod admin;
mod auth;
mod buy;
mod license;
mod webhooks;

pub use admin::*;
pub use auth::*;
pub use buy::*;
pub use license::*;
pub use webhooks::*;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::AppState;
use crate::middleware::{account_auth, admin_auth};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/webhooks/payment", post(payment_webhook));

    let licensed = Router::new()
        .route("/license/status", get(license_status))
        .route("/license/heartbeat", post(heartbeat))
        .route("/license/activate", post(activate))
        .route("/license/reset-hwid", post(reset_hwid))
        .route("/buy", post(initiate_buy))
        .layer(from_fn_with_state(state.clone(), account_auth));

    let admin = Router::new()
        .route("/admin/license/{account_id}", post(admin_license_action))
        .layer(from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .merge(public)
        .merge(licensed)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
