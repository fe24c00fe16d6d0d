//! Vehicle handlers

use super::{non_empty, single_row};
use crate::auth::CurrentUser;
use crate::cars::{Car, CarWithOwner, CreateCarRequest, UpdateCarRequest};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

const NO_CARS: &str = "Cannot find cars";

/// New car owned by the caller
pub async fn create_car(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateCarRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    request.validate()?;
    let car = state
        .cars
        .create(user.user_id(), &request)
        .await?
        .ok_or_else(|| ApiError::Unprocessable("Cannot create car".to_string()))?;

    info!(car_id = car.id, "Car created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "message": "Car successfully created",
            "car": car,
        })),
    ))
}

pub async fn list_cars(State(state): State<AppState>) -> ApiResult<Json<Vec<CarWithOwner>>> {
    let cars = state.cars.find_all().await?;
    Ok(Json(non_empty(cars, NO_CARS)?))
}

pub async fn my_cars(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<CarWithOwner>>> {
    let cars = state.cars.find_by_owner(user.user_id()).await?;
    Ok(Json(non_empty(cars, NO_CARS)?))
}

pub async fn cars_without_owner(State(state): State<AppState>) -> ApiResult<Json<Vec<Car>>> {
    let cars = state.cars.find_without_owner().await?;
    Ok(Json(non_empty(cars, NO_CARS)?))
}

pub async fn cars_by_brand(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> ApiResult<Json<Vec<Car>>> {
    let cars = state.cars.find_by_brand(&brand).await?;
    Ok(Json(non_empty(cars, NO_CARS)?))
}

pub async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CarWithOwner>> {
    state
        .cars
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Cannot find car".to_string()))
}

pub async fn update_car(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<UpdateCarRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;
    let affected = state.cars.update(id, &request).await?;
    single_row(affected, "Cannot update car")?;

    Ok(Json(json!({
        "ok": true,
        "message": "Car successfully updated",
    })))
}

pub async fn delete_car(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let affected = state.cars.delete(id).await?;
    single_row(affected, "Cannot delete car")?;

    Ok(Json(json!({
        "ok": true,
        "message": "Car successfully deleted",
    })))
}
