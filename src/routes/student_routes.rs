use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::student_dto::{
    AssignBusStopRequest, CreateStudentRequest, StudentSearchQuery, StudentValidationResponse,
    UpdateActiveStatusRequest, UpdateStudentRequest,
};
use crate::dto::ApiResponse;
use crate::models::analytics::StudentStatistics;
use crate::models::Student;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_student_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_student).get(list_students))
        .route("/search", get(search_students))
        .route("/statistics", get(student_statistics))
        .route("/missing-info", get(students_with_missing_info))
        .route("/validate", post(validate_student))
        .route("/:id", get(get_student).put(update_student).delete(delete_student))
        .route("/:id/active", put(update_active_status))
        .route("/:id/bus-stop", put(assign_bus_stop))
}

async fn create_student(
    State(state): State<AppState>,
    Json(request): Json<CreateStudentRequest>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    request.validate()?;
    let student = state.students.add_student(request.into_student()).await?;
    Ok(Json(ApiResponse::success_with_message(
        student,
        "Student created".to_string(),
    )))
}

async fn list_students(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Student>>>, AppError> {
    Ok(Json(ApiResponse::success(state.students.get_all_students().await?)))
}

/// `q` busca en texto libre; `grade` y `route` filtran de forma exacta
async fn search_students(
    State(state): State<AppState>,
    Query(query): Query<StudentSearchQuery>,
) -> Result<Json<ApiResponse<Vec<Student>>>, AppError> {
    let students = if let Some(route) = query.route.as_deref() {
        state.students.students_by_route(route).await?
    } else if let Some(grade) = query.grade.as_deref() {
        state.students.students_by_grade(grade).await?
    } else {
        state
            .students
            .search_students(query.q.as_deref().unwrap_or_default())
            .await?
    };
    Ok(Json(ApiResponse::success(students)))
}

async fn student_statistics(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StudentStatistics>>, AppError> {
    Ok(Json(ApiResponse::success(state.students.student_statistics().await?)))
}

async fn students_with_missing_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Student>>>, AppError> {
    Ok(Json(ApiResponse::success(
        state.students.students_with_missing_info().await?,
    )))
}

async fn validate_student(
    State(state): State<AppState>,
    Json(request): Json<CreateStudentRequest>,
) -> Result<Json<ApiResponse<StudentValidationResponse>>, AppError> {
    let errors = state.students.validate_student(&request.into_student()).await?;
    Ok(Json(ApiResponse::success(StudentValidationResponse {
        is_valid: errors.is_empty(),
        errors,
    })))
}

async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    Ok(Json(ApiResponse::success(state.students.get_student_by_id(id).await?)))
}

async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStudentRequest>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    request.validate()?;
    let mut student = state.students.get_student_by_id(id).await?;
    request.apply_to(&mut student);
    let updated = state.students.update_student(student).await?;
    Ok(Json(ApiResponse::success(updated)))
}

async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.students.delete_student(id).await?;
    Ok(Json(ApiResponse::success_with_message((), "Student deleted".to_string())))
}

async fn update_active_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateActiveStatusRequest>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    let student = state.students.update_active_status(id, request.active).await?;
    Ok(Json(ApiResponse::success(student)))
}

async fn assign_bus_stop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignBusStopRequest>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    request.validate()?;
    let student = state
        .students
        .assign_student_to_bus_stop(id, &request.bus_stop)
        .await?;
    Ok(Json(ApiResponse::success(student)))
}
