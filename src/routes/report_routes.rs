use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::dto::ApiResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_report_router() -> Router<AppState> {
    Router::new()
        .route("/students.csv", get(students_csv))
        .route("/drivers.csv", get(drivers_csv))
        .route("/export/students", post(export_students))
        .route("/export/drivers", post(export_drivers))
        .route("/schedules", post(generate_all_schedules))
        .route("/schedules/:route_id", post(generate_schedule))
        .route("/summary", post(generate_summary))
}

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

async fn students_csv(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.reports.students_csv().await?;
    Ok(([(header::CONTENT_TYPE, CSV_CONTENT_TYPE)], body))
}

async fn drivers_csv(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.reports.drivers_csv().await?;
    Ok(([(header::CONTENT_TYPE, CSV_CONTENT_TYPE)], body))
}

async fn export_students(State(state): State<AppState>) -> Result<Json<ApiResponse<PathBuf>>, AppError> {
    Ok(Json(ApiResponse::success(state.reports.export_students_csv().await?)))
}

async fn export_drivers(State(state): State<AppState>) -> Result<Json<ApiResponse<PathBuf>>, AppError> {
    Ok(Json(ApiResponse::success(state.reports.export_drivers_csv().await?)))
}

async fn generate_schedule(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PathBuf>>, AppError> {
    Ok(Json(ApiResponse::success(
        state.reports.generate_route_schedule(route_id).await?,
    )))
}

async fn generate_all_schedules(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PathBuf>>>, AppError> {
    let paths = state.reports.generate_all_route_schedules().await?;
    let message = format!("{} schedules generated", paths.len());
    Ok(Json(ApiResponse::success_with_message(paths, message)))
}

async fn generate_summary(State(state): State<AppState>) -> Result<Json<ApiResponse<PathBuf>>, AppError> {
    Ok(Json(ApiResponse::success(
        state.reports.generate_route_summary_report().await?,
    )))
}
