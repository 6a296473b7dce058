//! Health endpoint and general HTTP behaviour.

mod common;

use axum::http::{Method, StatusCode};

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = common::build_test_app();
    let response = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["store_healthy"], true);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app();
    let response = app
        .send(Method::GET, "/this-route-does-not-exist", None, None)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = common::build_test_app();
    let response = app.send(Method::GET, "/health", None, None).await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: staff routes reject missing and forged tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn staff_routes_require_a_bearer_token() {
    let app = common::build_test_app();

    let missing = app.send(Method::GET, "/api/v1/leads/1", None, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(common::body_json(missing).await["code"], "UNAUTHORIZED");

    let forged = app.get("/api/v1/leads/1", "not.a.jwt").await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}
