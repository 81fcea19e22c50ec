use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),

    /// Activation key is malformed or unknown.
    #[error("invalid activation key")]
    InvalidKey,
    /// Activation key was already consumed by a previous activation.
    #[error("activation key has already been used")]
    KeyAlreadyUsed,
    /// Hardware reset attempted inside the cooldown window.
    #[error("hardware reset not available yet")]
    ResetRateLimited { available_at: i64 },
    /// A conditional write lost its race. Callers retry the whole operation.
    #[error("record was modified concurrently")]
    ConcurrentModification,
    /// Conditional-write retries exhausted. Transient; the caller should retry later.
    #[error("could not apply license mutation, try again")]
    ExtensionConflict,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("payment provider error: {0}")]
    Provider(#[from] reqwest::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code included in every error response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidKey => "INVALID_KEY",
            AppError::KeyAlreadyUsed => "KEY_ALREADY_USED",
            AppError::ResetRateLimited { .. } => "RESET_RATE_LIMITED",
            AppError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            AppError::ExtensionConflict => "EXTENSION_CONFLICT",
            AppError::Provider(_) => "PROVIDER_UNAVAILABLE",
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidKey => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::KeyAlreadyUsed => StatusCode::CONFLICT,
            AppError::ResetRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            // Transient: the request can be retried as a whole.
            AppError::ConcurrentModification | AppError::ExtensionConflict => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Never leak internal detail to callers; keep it in the logs.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            AppError::Pool(e) => {
                tracing::error!(error = %e, "connection pool error");
                "internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "internal server error".to_string()
            }
            AppError::Provider(e) => {
                tracing::warn!(error = %e, "payment provider unreachable");
                "payment provider unavailable".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": message,
            "code": self.code(),
        });
        if let AppError::ResetRateLimited { available_at } = &self {
            body["available_at"] = json!(available_at);
        }

        (status, Json(body)).into_response()
    }
}
