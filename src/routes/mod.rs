//! Routers HTTP
//!
//! Cada módulo expone `create_*_router()`; `create_app_router` los monta bajo
//! `/api` junto con `/health`, CORS y trazas de peticiones.

pub mod bus_routes;
pub mod driver_routes;
pub mod health_routes;
pub mod import_routes;
pub mod report_routes;
pub mod route_routes;
pub mod student_routes;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::cors_layer_for;
use crate::state::AppState;

pub fn create_app_router(state: AppState) -> Router {
    let cors = cors_layer_for(&state.config.cors_origins);

    Router::new()
        .nest("/health", health_routes::create_health_router())
        .nest("/api/students", student_routes::create_student_router())
        .nest("/api/routes", route_routes::create_route_router())
        .nest("/api/buses", bus_routes::create_bus_router())
        .nest("/api/drivers", driver_routes::create_driver_router())
        .nest("/api/reports", report_routes::create_report_router())
        .nest("/api/import", import_routes::create_import_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
