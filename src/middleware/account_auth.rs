use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::db::{AppState, queries};
use crate::error::AppError;
use crate::jwt;
use crate::models::Account;

/// Request-scoped authenticated account. Inserted by the auth middleware;
/// handlers receive it via `Extension`. Credentials never live in process
/// globals.
#[derive(Clone)]
pub struct AuthedAccount(pub Account);

async fn resolve_account(
    state: &AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Account, AppError> {
    let TypedHeader(auth) =
        bearer.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
    let account_id = jwt::verify_session_token(&state.config.token_secret, auth.token())?;

    let conn = state.db.get()?;
    queries::get_account_by_id(&conn, &account_id)?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))
}

pub async fn account_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account = resolve_account(&state, bearer).await?;
    request.extensions_mut().insert(AuthedAccount(account));
    Ok(next.run(request).await)
}

/// Same as `account_auth` but additionally requires the administrative flag.
pub async fn admin_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account = resolve_account(&state, bearer).await?;
    if !account.is_admin {
        return Err(AppError::Forbidden("administrator access required".into()));
    }
    request.extensions_mut().insert(AuthedAccount(account));
    Ok(next.run(request).await)
}
