//! Integration tests for the health endpoint and WebSocket admission.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["connections"], 0);
    assert_eq!(json["rooms"], 0);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_test_app();

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ws_without_identity_headers_returns_401() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(app.router, "/ws").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_ws_with_malformed_user_id_returns_401() {
    let app = common::build_test_app();

    let (status, json) = common::get_json_with_headers(
        app.router,
        "/ws",
        &[("x-user-id", "not-a-uuid"), ("x-user-name", "Aria")],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_ws_with_oversized_display_name_returns_400() {
    let app = common::build_test_app();
    let name = "x".repeat(65);

    let (status, json) = common::get_json_with_headers(
        app.router,
        "/ws",
        &[
            ("x-user-id", "6f1c2a7e-3b1d-4c55-9a63-0d2f4b8e9a10"),
            ("x-user-name", name.as_str()),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "VALIDATION_ERROR");
}
