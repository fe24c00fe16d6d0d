//! Sign-in, sign-up, log-out and profile endpoints

use super::users::{CreateUserRequest, LoginRequest};
use super::CurrentUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::session::Session;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use carlot_auth::{AuthError, RoleId};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Verify email and password, then embed a credential in the session.
///
/// Every failure, including a malformed body, is reported as the same 401.
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Ok(Json(request)) = body else {
        debug!("Sign-in rejected: unreadable body");
        return Err(AuthError::InvalidCredentials.into());
    };

    let Some(user) = state
        .users
        .authenticate(&request.email, &request.password)
        .await?
    else {
        info!("Sign-in rejected");
        return Err(AuthError::InvalidCredentials.into());
    };

    let token = state.tokens.issue(user.id, user.role())?;
    session.set_credential(token).await;
    let sid = state.signer.sign(&session.id().await);

    info!(user_id = user.id, "User signed in");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "user": user.email,
            "sid": sid,
        })),
    ))
}

/// Register a user with the default role and sign them in
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    request.validate()?;

    let role = RoleId(state.config.roles.default_role);
    let user = state.users.create(&request, role).await?;

    let token = state.tokens.issue(user.id, user.role())?;
    session.set_credential(token).await;
    let sid = state.signer.sign(&session.id().await);

    info!(user_id = user.id, "User signed up");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "message": "User successfully registered",
            "user": user.email,
            "sid": sid,
        })),
    ))
}

pub async fn log_out(user: CurrentUser, session: Session) -> ApiResult<Json<Value>> {
    session.destroy().await?;

    info!(user_id = user.user_id(), "User logged out");
    Ok(Json(json!({
        "ok": true,
        "message": "Successfully logged out",
    })))
}

pub async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let profile = state
        .users
        .find_profile(user.user_id())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!(profile)))
}
