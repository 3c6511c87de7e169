use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::dto::bus_dto::{CreateBusRequest, UpdateBusRequest};
use crate::dto::ApiResponse;
use crate::models::Bus;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_bus_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_bus).get(list_buses))
        .route("/available", get(available_buses))
        .route("/:id", get(get_bus).put(update_bus).delete(delete_bus))
        .route("/:id/students/count", get(assigned_student_count))
}

async fn create_bus(
    State(state): State<AppState>,
    Json(request): Json<CreateBusRequest>,
) -> Result<Json<ApiResponse<Bus>>, AppError> {
    request.validate()?;
    let bus = state.buses.add_bus(request.into_bus()).await?;
    Ok(Json(ApiResponse::success_with_message(bus, "Bus created".to_string())))
}

async fn list_buses(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Bus>>>, AppError> {
    Ok(Json(ApiResponse::success(state.buses.get_all_buses().await?)))
}

async fn available_buses(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Bus>>>, AppError> {
    Ok(Json(ApiResponse::success(state.buses.available_buses().await?)))
}

async fn get_bus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Bus>>, AppError> {
    Ok(Json(ApiResponse::success(state.buses.get_bus_by_id(id).await?)))
}

async fn update_bus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBusRequest>,
) -> Result<Json<ApiResponse<Bus>>, AppError> {
    request.validate()?;
    let mut bus = state.buses.get_bus_by_id(id).await?;
    request.apply_to(&mut bus);
    Ok(Json(ApiResponse::success(state.buses.update_bus(bus).await?)))
}

async fn delete_bus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.buses.delete_bus(id).await?;
    Ok(Json(ApiResponse::success_with_message((), "Bus deleted".to_string())))
}

async fn assigned_student_count(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let count = state.buses.assigned_student_count(id).await?;
    Ok(Json(ApiResponse::success(json!({ "bus_id": id, "student_count": count }))))
}
