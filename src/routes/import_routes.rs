use std::path::PathBuf;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::dto::ApiResponse;
use crate::services::ImportSummary;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_import_router() -> Router<AppState> {
    Router::new()
        .route("/", post(import_json))
        .route("/file", post(import_file))
}

#[derive(Debug, Deserialize)]
struct ImportFileRequest {
    path: PathBuf,
}

/// El cuerpo es el documento `{ families, students }` tal cual
async fn import_json(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ApiResponse<ImportSummary>>, AppError> {
    let summary = state.imports.import_from_json(&body).await?;
    Ok(Json(ApiResponse::success(summary)))
}

async fn import_file(
    State(state): State<AppState>,
    Json(request): Json<ImportFileRequest>,
) -> Result<Json<ApiResponse<ImportSummary>>, AppError> {
    let summary = state.imports.import_from_file(&request.path).await?;
    Ok(Json(ApiResponse::success(summary)))
}
