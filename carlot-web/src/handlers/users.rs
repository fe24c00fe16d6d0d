//! User management handlers

use super::{non_empty, single_row};
use crate::auth::users::{CreateUserRequest, UpdateUserRequest, User};
use crate::cars::Car;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use carlot_auth::RoleId;
use serde_json::{json, Value};
use tracing::info;

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    request.validate()?;
    let user = state
        .users
        .create(&request, RoleId(state.config.roles.default_role))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "message": "User successfully registered",
            "user": user,
        })),
    ))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = state.users.find_all().await?;
    Ok(Json(non_empty(users, "Users not found")?))
}

pub async fn list_users_without_cars(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<User>>> {
    let users = state.users.find_without_cars().await?;
    Ok(Json(non_empty(users, "Users not found")?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    state
        .users
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn cars_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<Vec<Car>>> {
    let cars = state.users.find_cars_by_email(&email).await?;
    Ok(Json(non_empty(cars, "Cars not found")?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;
    let affected = state.users.update(id, &request).await?;
    single_row(affected, "Cannot update user")?;

    let user = state.users.find_by_id(id).await?;
    info!(user_id = id, "User updated");
    Ok(Json(json!({
        "ok": true,
        "message": "User successfully updated",
        "user": user,
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let affected = state.users.delete(id).await?;
    single_row(affected, "Cannot delete user")?;

    info!(user_id = id, "User deleted");
    Ok(Json(json!({
        "ok": true,
        "message": "User successfully deleted",
    })))
}
