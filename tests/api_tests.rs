use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use school_bus_routing::config::EnvironmentConfig;
use school_bus_routing::{create_app_router, AppState};

fn create_test_app(reports_dir: &std::path::Path) -> Router {
    let config = EnvironmentConfig {
        reports_dir: reports_dir.to_path_buf(),
        ..EnvironmentConfig::default()
    };
    create_app_router(AppState::in_memory(config))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create(app: &Router, uri: &str, body: Value) -> String {
    let (status, response) = send(app, "POST", uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK, "POST {} failed: {}", uri, response);
    response["data"]["id"].as_str().unwrap().to_string()
}

/// Ruta "East" con bus de 2 plazas y conductor en el turno AM
async fn east_route(app: &Router) -> String {
    let route_id = create(app, "/api/routes", json!({ "route_name": "East", "route_date": "2099-09-01" })).await;
    let bus_id = create(app, "/api/buses", json!({ "bus_number": "12", "seating_capacity": 2 })).await;
    let driver_id = create(
        app,
        "/api/drivers",
        json!({ "first_name": "Pat", "last_name": "Lee", "license_number": "CDL-1" }),
    )
    .await;

    let (status, _) = send(app, "PUT", &format!("/api/routes/{}/bus", route_id), Some(json!({ "bus_id": bus_id, "slot": "AM" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app, "PUT", &format!("/api/routes/{}/driver", route_id), Some(json!({ "driver_id": driver_id, "slot": "AM" }))).await;
    assert_eq!(status, StatusCode::OK);
    route_id
}

#[tokio::test]
async fn test_health_check() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path());
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "in-memory");
}

#[tokio::test]
async fn test_route_capacity_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path());
    let route_id = east_route(&app).await;

    let mut students = Vec::new();
    for name in ["Ava", "Ben", "Cy"] {
        students.push(create(&app, "/api/students", json!({ "student_name": name })).await);
    }

    let assign_uri = format!("/api/routes/{}/students", route_id);
    for student_id in &students[..2] {
        let (status, body) = send(&app, "POST", &assign_uri, Some(json!({ "student_id": student_id }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["am_route"], "East");
    }

    let (status, _) = send(&app, "POST", &assign_uri, Some(json!({ "student_id": students[2] }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, plan) = send(&app, "GET", &format!("/api/routes/{}/plan", route_id), None).await;
    assert_eq!(plan["data"]["assigned_count"], 2);
    assert_eq!(plan["data"]["is_at_capacity"], true);
    assert_eq!(plan["data"]["display_name"], "East (2/2 students)");

    let (_, can_assign) = send(
        &app,
        "GET",
        &format!("/api/routes/{}/can-assign?student_id={}", route_id, students[2]),
        None,
    )
    .await;
    assert_eq!(can_assign["data"]["can_assign"], false);
}

#[tokio::test]
async fn test_activation_requires_students() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path());
    let route_id = east_route(&app).await;

    let (_, validation) = send(&app, "GET", &format!("/api/routes/{}/validation", route_id), None).await;
    assert_eq!(validation["data"]["can_activate"], false);

    let (status, _) = send(&app, "POST", &format!("/api/routes/{}/activate", route_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let student_id = create(&app, "/api/students", json!({ "student_name": "Ava" })).await;
    send(
        &app,
        "POST",
        &format!("/api/routes/{}/students", route_id),
        Some(json!({ "student_id": student_id })),
    )
    .await;

    // Sin paradas la ruta sigue siendo activable
    let (status, body) = send(&app, "POST", &format!("/api/routes/{}/activate", route_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(body["data"]["building_status"], "active");
}

#[tokio::test]
async fn test_invalid_reorder_leaves_stops_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path());
    let route_id = east_route(&app).await;
    let stops_uri = format!("/api/routes/{}/stops", route_id);

    let mut stop_ids = Vec::new();
    for (name, time) in [("Main & 1st", "07:00:00"), ("Oak & 5th", "07:10:00"), ("School", "07:30:00")] {
        stop_ids.push(create(&app, &stops_uri, json!({ "stop_name": name, "scheduled_time": time })).await);
    }

    let (status, _) = send(
        &app,
        "PUT",
        &format!("{}/reorder", stops_uri),
        Some(json!({ "stop_ids": [stop_ids[2], stop_ids[0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, stops) = send(&app, "GET", &stops_uri, None).await;
    let order: Vec<&str> = stops["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(order, stop_ids.iter().map(String::as_str).collect::<Vec<_>>());

    let reversed: Vec<&String> = stop_ids.iter().rev().collect();
    let (status, body) = send(&app, "PUT", &format!("{}/reorder", stops_uri), Some(json!({ "stop_ids": reversed }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], stop_ids[2].as_str());
    assert_eq!(body["data"][0]["stop_order"], 1);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path());
    let missing = uuid::Uuid::new_v4();

    for uri in [
        format!("/api/students/{}", missing),
        format!("/api/routes/{}", missing),
        format!("/api/routes/{}/plan", missing),
        format!("/api/buses/{}", missing),
        format!("/api/drivers/{}", missing),
    ] {
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {}", uri);
    }
}

#[tokio::test]
async fn test_import_and_students_csv() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path());

    let document = json!({
        "families": [{ "id": 1, "parentGuardian": "Jordan Miller", "address": "12 Main St",
                       "city": "Wiley", "county": "Prowers" }],
        "students": [{ "familyId": 1, "firstName": "Ava", "lastName": "Miller" }]
    });
    let (status, body) = send(&app, "POST", "/api/import", Some(document)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["students_imported"], 1);

    let response = app
        .clone()
        .oneshot(Request::get("/api/reports/students.csv").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let csv = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(csv.starts_with("Student Number,Student Name"));
    assert!(csv.contains("Ava Miller"));
}
