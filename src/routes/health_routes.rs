use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = match &state.database {
        Some(connection) => {
            if connection.validate_connection().await {
                "connected"
            } else {
                "unavailable"
            }
        }
        None => "in-memory",
    };

    Json(json!({
        "status": if database == "unavailable" { "degraded" } else { "ok" },
        "database": database,
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
