//! Shared harness for the HTTP integration tests.
//!
//! Every test gets its own in-memory store and a temporary artifact
//! directory, wired through the same `build_app` the binary uses.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use jobhub_api::app::build_app;
use jobhub_api::auth::jwt::{generate_access_token, JwtConfig};
use jobhub_api::config::ServerConfig;
use jobhub_api::state::AppState;
use jobhub_core::roles::{ROLE_ADMIN, ROLE_MEMBER, ROLE_WORKER};
use jobhub_core::types::DbId;
use jobhub_db::MemoryJobStore;
use jobhub_events::EventBus;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Organization the default tokens act for.
pub const ORG: DbId = 1;
/// A second organization for scoping tests.
pub const OTHER_ORG: DbId = 2;

/// Build a test `ServerConfig` with safe defaults and the given artifact
/// directory.
pub fn test_config(artifact_root: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: None,
        artifact_root,
        retention_days: 30,
        retention_interval_secs: 3600,
        retention_include_active: false,
        job_timeout_secs: 3600,
        watchdog_interval_secs: 60,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// One isolated application instance.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Held so the directory outlives the app.
    _artifacts: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let artifacts = TempDir::new().expect("temp artifact dir");
        let config = test_config(artifacts.path().to_path_buf());
        let state = AppState::new(
            Arc::new(MemoryJobStore::new()),
            None,
            config,
            Arc::new(EventBus::default()),
        );
        Self {
            router: build_app(state.clone()),
            state,
            _artifacts: artifacts,
        }
    }

    /// Send a prepared request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str, token: &str) -> Response<Body> {
        self.send(authed(Method::GET, path, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(
        &self,
        path: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.send(json_request(Method::POST, path, token, body)).await
    }

    pub async fn post_empty(&self, path: &str, token: &str) -> Response<Body> {
        self.send(authed(Method::POST, path, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn put_json(
        &self,
        path: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.send(json_request(Method::PUT, path, token, body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response<Body> {
        self.send(authed(Method::DELETE, path, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        token: &str,
        form: MultipartForm,
    ) -> Response<Body> {
        let (content_type, body) = form.finish();
        let request = authed(Method::POST, path, token)
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Submit a job as `token` and return its id.
    pub async fn submit(&self, token: &str, name: &str) -> DbId {
        let response = self
            .post_json(
                "/api/v1/jobs",
                token,
                serde_json::json!({
                    "name": name,
                    "job_type": "fairness_assessment",
                    "parameters": { "model_id": 42 },
                }),
            )
            .await;
        assert_eq!(response.status(), 201, "submit {name}");
        body_json(response).await["data"]["id"]
            .as_i64()
            .expect("job id")
    }

    /// Submit, start and complete a job in `ORG`.
    pub async fn completed_job(&self, name: &str) -> DbId {
        let id = self.submit(&member_token(), name).await;
        let worker = worker_token();
        let started = self
            .post_empty(&format!("/api/v1/jobs/{id}/start"), &worker)
            .await;
        assert_eq!(started.status(), 200);
        let done = self
            .post_json(
                &format!("/api/v1/jobs/{id}/complete"),
                &worker,
                serde_json::json!({ "result": { "score": 0.93 } }),
            )
            .await;
        assert_eq!(done.status(), 200);
        id
    }
}

fn authed(method: Method, path: &str, token: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(path)
        .header(AUTHORIZATION, format!("Bearer {token}"))
}

fn json_request(method: Method, path: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    authed(method, path, token)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub fn token(user_id: DbId, organization_id: DbId, role: &str) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry_mins: 15,
    };
    generate_access_token(user_id, organization_id, role, &config).expect("token")
}

pub fn member_token() -> String {
    token(10, ORG, ROLE_MEMBER)
}

pub fn worker_token() -> String {
    token(20, ORG, ROLE_WORKER)
}

pub fn admin_token() -> String {
    token(1, ORG, ROLE_ADMIN)
}

pub fn other_org_member_token() -> String {
    token(30, OTHER_ORG, ROLE_MEMBER)
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Minimal `multipart/form-data` encoder.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "jobhub-test-boundary-7MA4YWxkTrZu0gW".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
