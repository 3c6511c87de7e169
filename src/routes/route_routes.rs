use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::dto::route_dto::{
    AddStopRequest, AssignBusRequest, AssignDriverRequest, CanAssignQuery, CloneRouteRequest,
    CreateRouteRequest, ReorderStopsRequest, RoutePlanResponse, RouteSearchQuery,
    TransitionStatusRequest, UpdateRouteRequest,
};
use crate::dto::student_dto::{AssignByAddressRequest, StudentRouteRequest};
use crate::dto::ApiResponse;
use crate::models::analytics::RouteUtilizationStats;
use crate::models::{Route, RouteStop, RouteValidationResult, Student};
use crate::services::AddressAssignmentReport;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_route_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_route).get(list_routes))
        .route("/search", get(search_routes))
        .route("/with-capacity", get(routes_with_capacity))
        .route("/utilization", get(utilization_stats))
        .route("/unassigned-students", get(unassigned_students))
        .route("/assign-by-address", post(assign_by_address))
        .route("/:id", get(get_route).put(update_route).delete(delete_route))
        .route("/:id/plan", get(get_route_plan))
        .route("/:id/bus", put(assign_bus))
        .route("/:id/driver", put(assign_driver))
        .route("/:id/can-assign", get(can_assign_student))
        .route("/:id/students", post(assign_student))
        .route("/:id/students/:student_id", delete(remove_student))
        .route("/:id/validation", get(validate_for_activation))
        .route("/:id/activate", post(activate_route))
        .route("/:id/deactivate", post(deactivate_route))
        .route("/:id/status", put(transition_status))
        .route("/:id/stops", get(list_stops).post(add_stop))
        .route("/:id/stops/reorder", put(reorder_stops))
        .route("/:id/stops/:stop_id", delete(remove_stop))
        .route("/:id/clone", post(clone_route))
}

async fn create_route(
    State(state): State<AppState>,
    Json(request): Json<CreateRouteRequest>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    request.validate()?;
    let route = state.routes.create_new_route(request.into_route()).await?;
    Ok(Json(ApiResponse::success_with_message(route, "Route created".to_string())))
}

async fn list_routes(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Route>>>, AppError> {
    Ok(Json(ApiResponse::success(state.routes.get_all_routes().await?)))
}

async fn search_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteSearchQuery>,
) -> Result<Json<ApiResponse<Vec<Route>>>, AppError> {
    let routes = state
        .routes
        .search_routes(query.q.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(ApiResponse::success(routes)))
}

async fn routes_with_capacity(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<RoutePlanResponse>>>, AppError> {
    let plans = state.routes.routes_with_capacity().await?;
    Ok(Json(ApiResponse::success(
        plans.iter().map(RoutePlanResponse::from).collect(),
    )))
}

async fn utilization_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RouteUtilizationStats>>, AppError> {
    Ok(Json(ApiResponse::success(state.routes.route_utilization_stats().await?)))
}

async fn unassigned_students(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Student>>>, AppError> {
    Ok(Json(ApiResponse::success(state.routes.unassigned_students().await?)))
}

/// Sin ids se procesan todos los estudiantes activos sin ruta
async fn assign_by_address(
    State(state): State<AppState>,
    Json(request): Json<AssignByAddressRequest>,
) -> Result<Json<ApiResponse<AddressAssignmentReport>>, AppError> {
    let students = if request.student_ids.is_empty() {
        state.routes.unassigned_students().await?
    } else {
        let mut students = Vec::with_capacity(request.student_ids.len());
        for id in request.student_ids {
            students.push(state.students.get_student_by_id(id).await?);
        }
        students
    };

    let report = state.routes.assign_students_by_address(students).await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    Ok(Json(ApiResponse::success(state.routes.get_route_by_id(id).await?)))
}

async fn get_route_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RoutePlanResponse>>, AppError> {
    let plan = state.routes.load_route_plan(id).await?;
    Ok(Json(ApiResponse::success(RoutePlanResponse::from(&plan))))
}

async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRouteRequest>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    request.validate()?;
    let mut route = state.routes.get_route_by_id(id).await?;
    request.apply_to(&mut route);
    Ok(Json(ApiResponse::success(state.routes.update_route(route).await?)))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.routes.delete_route(id).await?;
    Ok(Json(ApiResponse::success_with_message((), "Route deleted".to_string())))
}

async fn assign_bus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignBusRequest>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    let route = state
        .routes
        .assign_bus_to_route(id, request.bus_id, request.slot)
        .await?;
    Ok(Json(ApiResponse::success(route)))
}

async fn assign_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignDriverRequest>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    let route = state
        .routes
        .assign_driver_to_route(id, request.driver_id, request.slot)
        .await?;
    Ok(Json(ApiResponse::success(route)))
}

async fn can_assign_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CanAssignQuery>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let can_assign = state
        .routes
        .can_assign_student_to_route(query.student_id, id)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "can_assign": can_assign }))))
}

async fn assign_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StudentRouteRequest>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    let student = state
        .routes
        .assign_student_to_route(request.student_id, id, request.slot)
        .await?;
    Ok(Json(ApiResponse::success(student)))
}

async fn remove_student(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Student>>, AppError> {
    let student = state.routes.remove_student_from_route(student_id, id).await?;
    Ok(Json(ApiResponse::success(student)))
}

async fn validate_for_activation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RouteValidationResult>>, AppError> {
    Ok(Json(ApiResponse::success(
        state.routes.validate_route_for_activation(id).await?,
    )))
}

async fn activate_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    let route = state.routes.activate_route(id).await?;
    Ok(Json(ApiResponse::success_with_message(route, "Route activated".to_string())))
}

async fn deactivate_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    Ok(Json(ApiResponse::success(state.routes.deactivate_route(id).await?)))
}

async fn transition_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionStatusRequest>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    let route = state.routes.transition_route_status(id, request.status).await?;
    Ok(Json(ApiResponse::success(route)))
}

async fn list_stops(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<RouteStop>>>, AppError> {
    Ok(Json(ApiResponse::success(state.routes.get_route_stops(id).await?)))
}

async fn add_stop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddStopRequest>,
) -> Result<Json<ApiResponse<RouteStop>>, AppError> {
    request.validate()?;
    let mut stop = RouteStop::new(id, request.stop_name, request.scheduled_time);
    stop.address = request.address;
    let stop = state.routes.add_stop_to_route(id, stop).await?;
    Ok(Json(ApiResponse::success(stop)))
}

async fn reorder_stops(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReorderStopsRequest>,
) -> Result<Json<ApiResponse<Vec<RouteStop>>>, AppError> {
    let stops = state.routes.reorder_route_stops(id, &request.stop_ids).await?;
    Ok(Json(ApiResponse::success(stops)))
}

async fn remove_stop(
    State(state): State<AppState>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.routes.remove_stop_from_route(id, stop_id).await?;
    Ok(Json(ApiResponse::success_with_message((), "Stop removed".to_string())))
}

async fn clone_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CloneRouteRequest>,
) -> Result<Json<ApiResponse<Route>>, AppError> {
    request.validate()?;
    let route = state
        .routes
        .clone_route(id, &request.new_name, request.new_date)
        .await?;
    Ok(Json(ApiResponse::success(route)))
}
