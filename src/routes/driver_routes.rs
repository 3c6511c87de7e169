use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::driver_dto::{CreateDriverRequest, UpdateDriverRequest};
use crate::dto::ApiResponse;
use crate::models::Driver;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_driver_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_driver).get(list_drivers))
        .route("/available", get(available_drivers))
        .route("/:id", get(get_driver).put(update_driver).delete(delete_driver))
}

async fn create_driver(
    State(state): State<AppState>,
    Json(request): Json<CreateDriverRequest>,
) -> Result<Json<ApiResponse<Driver>>, AppError> {
    request.validate()?;
    let driver = state.drivers.add_driver(request.into_driver()).await?;
    Ok(Json(ApiResponse::success_with_message(driver, "Driver created".to_string())))
}

async fn list_drivers(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Driver>>>, AppError> {
    Ok(Json(ApiResponse::success(state.drivers.get_all_drivers().await?)))
}

async fn available_drivers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Driver>>>, AppError> {
    Ok(Json(ApiResponse::success(state.drivers.available_drivers().await?)))
}

async fn get_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Driver>>, AppError> {
    Ok(Json(ApiResponse::success(state.drivers.get_driver_by_id(id).await?)))
}

async fn update_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDriverRequest>,
) -> Result<Json<ApiResponse<Driver>>, AppError> {
    request.validate()?;
    let mut driver = state.drivers.get_driver_by_id(id).await?;
    request.apply_to(&mut driver);
    Ok(Json(ApiResponse::success(state.drivers.update_driver(driver).await?)))
}

async fn delete_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.drivers.delete_driver(id).await?;
    Ok(Json(ApiResponse::success_with_message((), "Driver deleted".to_string())))
}
