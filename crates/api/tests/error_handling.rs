//! Tests for `AppError` -> HTTP response mapping and the cross-cutting
//! HTTP behaviour every endpoint shares (authentication, request ids,
//! health).

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::IntoResponse;
use common::{body_json, member_token, token, TestApp, ORG};
use http_body_util::BodyExt;
use jobhub_api::auth::jwt::{generate_access_token, JwtConfig};
use jobhub_api::error::AppError;
use jobhub_core::error::CoreError;
use jobhub_core::roles::ROLE_MEMBER;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// AppError mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Job",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Job with id 42 not found");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("days_to_keep must be >= 0".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "days_to_keep must be >= 0");
}

#[tokio::test]
async fn conflict_error_returns_409() {
    let err = AppError::Core(CoreError::Conflict(
        "Job already finished and cannot be cancelled".into(),
    ));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn unauthorized_and_forbidden_map_to_401_and_403() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Unauthorized("no".into()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, json) =
        error_to_response(AppError::Core(CoreError::Forbidden("no".into()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("Missing required 'file' field".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "Missing required 'file' field");
}

#[tokio::test]
async fn internal_errors_return_500_and_sanitize_message() {
    let (status, json) =
        error_to_response(AppError::InternalError("disk /var/secret full".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");

    let (status, json) =
        error_to_response(AppError::Core(CoreError::Internal("stack trace".into()))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn row_not_found_returns_404() {
    let (status, json) = error_to_response(AppError::Database(sqlx::Error::RowNotFound)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_returns_401() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/jobs")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Missing Authorization header");
}

#[tokio::test]
async fn malformed_and_forged_tokens_return_401() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/api/v1/jobs")
        .header("authorization", "Token abc")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/api/v1/jobs", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = generate_access_token(
        10,
        ORG,
        ROLE_MEMBER,
        &JwtConfig {
            secret: "some-other-secret".into(),
            access_token_expiry_mins: 15,
        },
    )
    .unwrap();
    let response = app.get("/api/v1/jobs", &forged).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid or expired token");
}

#[tokio::test]
async fn expired_token_returns_401() {
    let app = TestApp::new();
    let expired = generate_access_token(
        10,
        ORG,
        ROLE_MEMBER,
        &JwtConfig {
            secret: common::TEST_JWT_SECRET.into(),
            access_token_expiry_mins: -10,
        },
    )
    .unwrap();

    let response = app.get("/api/v1/jobs", &expired).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_role_is_authenticated_but_not_privileged() {
    let app = TestApp::new();
    let guest = token(77, ORG, "guest");

    let list = app.get("/api/v1/jobs", &guest).await;
    assert_eq!(list.status(), StatusCode::OK);

    let cleanup = app.post_empty("/api/v1/jobs/cleanup", &guest).await;
    assert_eq!(cleanup.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// General HTTP behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_reports_memory_store() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["store"], "memory");
    assert_eq!(json["db_healthy"], true);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = TestApp::new();
    let response = app.get("/api/v1/jobs", &member_token()).await;

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn provided_request_id_is_echoed() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-abc-123")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = TestApp::new();
    let response = app.get("/api/v1/this-route-does-not-exist", &member_token()).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_job_id_is_rejected() {
    let app = TestApp::new();
    let response = app.get("/api/v1/jobs/abc", &member_token()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
