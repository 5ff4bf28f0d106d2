//! HTTP-level integration tests for the executor endpoints (start,
//! progress, complete, fail, timeout) and job artifacts.

mod common;

use axum::http::{header, StatusCode};
use common::{
    admin_token, body_bytes, body_json, member_token, other_org_member_token, token, worker_token,
    MultipartForm, TestApp, OTHER_ORG,
};
use jobhub_core::roles::ROLE_WORKER;
use sha2::{Digest, Sha256};

const REPORT: &[u8] = b"%PDF-1.7 fairness report body";

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle_to_completed() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "lifecycle").await;
    let worker = worker_token();

    let started = body_json(
        app.post_empty(&format!("/api/v1/jobs/{id}/start"), &worker)
            .await,
    )
    .await;
    assert_eq!(started["data"]["status"], "running");
    assert!(started["data"]["started_at"].is_string());

    for percent in [25, 60, 60] {
        let response = app
            .post_json(
                &format!("/api/v1/jobs/{id}/progress"),
                &worker,
                serde_json::json!({ "progress": percent }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["progress"], percent);
    }

    let done = app
        .post_json(
            &format!("/api/v1/jobs/{id}/complete"),
            &worker,
            serde_json::json!({ "result": { "disparate_impact": 0.91 } }),
        )
        .await;
    assert_eq!(done.status(), StatusCode::OK);
    let json = body_json(done).await;
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["progress"], 100);
    assert_eq!(json["data"]["result"]["disparate_impact"], 0.91);
    assert!(json["data"]["completed_at"].is_string());
    assert!(json["data"]["error_message"].is_null());
}

#[tokio::test]
async fn fail_records_error_message() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "failing").await;
    app.post_empty(&format!("/api/v1/jobs/{id}/start"), &worker_token())
        .await;

    let response = app
        .post_json(
            &format!("/api/v1/jobs/{id}/fail"),
            &worker_token(),
            serde_json::json!({ "error_message": "dataset missing column 'age'" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "failed");
    assert_eq!(json["data"]["error_message"], "dataset missing column 'age'");
    assert!(json["data"]["result"].is_null());
}

#[tokio::test]
async fn timeout_sets_no_error_message() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "slow").await;
    app.post_empty(&format!("/api/v1/jobs/{id}/start"), &worker_token())
        .await;

    let response = app
        .post_empty(&format!("/api/v1/jobs/{id}/timeout"), &worker_token())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "timeout");
    assert!(json["data"]["error_message"].is_null());
    assert!(json["data"]["completed_at"].is_string());
}

#[tokio::test]
async fn illegal_transitions_conflict() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "pending").await;
    let worker = worker_token();

    // Pending jobs cannot complete, fail, time out or report progress.
    let complete = app
        .post_empty(&format!("/api/v1/jobs/{id}/complete"), &worker)
        .await;
    assert_eq!(complete.status(), StatusCode::CONFLICT);

    let progress = app
        .post_json(
            &format!("/api/v1/jobs/{id}/progress"),
            &worker,
            serde_json::json!({ "progress": 10 }),
        )
        .await;
    assert_eq!(progress.status(), StatusCode::CONFLICT);

    let timeout = app
        .post_empty(&format!("/api/v1/jobs/{id}/timeout"), &worker)
        .await;
    assert_eq!(timeout.status(), StatusCode::CONFLICT);

    // Starting twice conflicts.
    app.post_empty(&format!("/api/v1/jobs/{id}/start"), &worker)
        .await;
    let restart = app
        .post_empty(&format!("/api/v1/jobs/{id}/start"), &worker)
        .await;
    assert_eq!(restart.status(), StatusCode::CONFLICT);

    let json = body_json(app.get(&format!("/api/v1/jobs/{id}"), &member_token()).await).await;
    assert_eq!(json["data"]["status"], "running");
}

#[tokio::test]
async fn progress_must_be_in_range_and_monotonic() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "progress").await;
    let worker = worker_token();
    app.post_empty(&format!("/api/v1/jobs/{id}/start"), &worker)
        .await;
    app.post_json(
        &format!("/api/v1/jobs/{id}/progress"),
        &worker,
        serde_json::json!({ "progress": 50 }),
    )
    .await;

    for bad in [40, 101, -1] {
        let response = app
            .post_json(
                &format!("/api/v1/jobs/{id}/progress"),
                &worker,
                serde_json::json!({ "progress": bad }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "progress {bad}");
    }

    let json = body_json(app.get(&format!("/api/v1/jobs/{id}"), &member_token()).await).await;
    assert_eq!(json["data"]["progress"], 50);
}

#[tokio::test]
async fn lifecycle_endpoints_require_worker_role() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "guarded").await;

    let member = app
        .post_empty(&format!("/api/v1/jobs/{id}/start"), &member_token())
        .await;
    assert_eq!(member.status(), StatusCode::FORBIDDEN);
    let json = body_json(member).await;
    assert_eq!(json["code"], "FORBIDDEN");

    let admin = app
        .post_empty(&format!("/api/v1/jobs/{id}/start"), &admin_token())
        .await;
    assert_eq!(admin.status(), StatusCode::OK);
}

#[tokio::test]
async fn worker_is_scoped_to_its_organization() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "org one").await;
    let foreign_worker = token(99, OTHER_ORG, ROLE_WORKER);

    let response = app
        .post_empty(&format!("/api/v1/jobs/{id}/start"), &foreign_worker)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

fn report_form() -> MultipartForm {
    MultipartForm::new()
        .text("artifact_type", "report")
        .file("file", "fairness.pdf", "application/pdf", REPORT)
}

#[tokio::test]
async fn record_list_and_download_artifact() {
    let app = TestApp::new();
    let id = app.completed_job("with report").await;

    let response = app
        .post_multipart(
            &format!("/api/v1/jobs/{id}/artifacts"),
            &worker_token(),
            report_form(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let artifact = &json["data"];
    let artifact_id = artifact["id"].as_i64().unwrap();
    let expected_checksum = format!("{:x}", Sha256::digest(REPORT));

    assert_eq!(artifact["job_id"], id);
    assert_eq!(artifact["artifact_type"], "report");
    assert_eq!(artifact["file_name"], "fairness.pdf");
    assert_eq!(artifact["content_type"], "application/pdf");
    assert_eq!(artifact["file_size"], REPORT.len());
    assert_eq!(artifact["checksum_sha256"], expected_checksum.as_str());
    let download_url = format!("/api/v1/jobs/{id}/artifacts/{artifact_id}/download");
    assert_eq!(artifact["download_url"], download_url.as_str());

    let list = body_json(
        app.get(&format!("/api/v1/jobs/{id}/artifacts"), &member_token())
            .await,
    )
    .await;
    let items = list["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["download_url"], download_url.as_str());

    let download = app.get(&download_url, &member_token()).await;
    assert_eq!(download.status(), StatusCode::OK);
    let headers = download.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_LENGTH],
        REPORT.len().to_string().as_str()
    );
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("fairness.pdf"));
    assert_eq!(headers["x-checksum-sha256"], expected_checksum.as_str());
    assert_eq!(body_bytes(download).await, REPORT);
}

#[tokio::test]
async fn explicit_content_type_field_wins() {
    let app = TestApp::new();
    let id = app.completed_job("explicit type").await;

    let form = MultipartForm::new()
        .text("artifact_type", "evidence_pack")
        .text("content_type", "application/zip")
        .file("file", "pack.bin", "application/octet-stream", b"PK\x03\x04");
    let response = app
        .post_multipart(&format!("/api/v1/jobs/{id}/artifacts"), &worker_token(), form)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["content_type"], "application/zip");
}

#[tokio::test]
async fn recording_artifact_requires_completed_job() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "not done").await;

    let response = app
        .post_multipart(
            &format!("/api/v1/jobs/{id}/artifacts"),
            &worker_token(),
            report_form(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn recording_artifact_requires_fields_and_worker_role() {
    let app = TestApp::new();
    let id = app.completed_job("fields").await;
    let path = format!("/api/v1/jobs/{id}/artifacts");

    let no_file = MultipartForm::new().text("artifact_type", "report");
    let response = app.post_multipart(&path, &worker_token(), no_file).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let no_type = MultipartForm::new().file("file", "a.txt", "text/plain", b"hi");
    let response = app.post_multipart(&path, &worker_token(), no_type).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post_multipart(&path, &member_token(), report_form()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn artifacts_of_unfinished_job_list_empty_and_download_conflicts() {
    let app = TestApp::new();
    let id = app.submit(&member_token(), "pending").await;

    let list = app
        .get(&format!("/api/v1/jobs/{id}/artifacts"), &member_token())
        .await;
    assert_eq!(list.status(), StatusCode::OK);
    let json = body_json(list).await;
    assert_eq!(json["data"], serde_json::json!([]));

    let download = app
        .get(
            &format!("/api/v1/jobs/{id}/artifacts/1/download"),
            &member_token(),
        )
        .await;
    assert_eq!(download.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn download_of_missing_artifact_returns_404() {
    let app = TestApp::new();
    let id = app.completed_job("no files").await;

    let response = app
        .get(
            &format!("/api/v1/jobs/{id}/artifacts/12345/download"),
            &member_token(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn artifacts_are_hidden_from_other_organizations() {
    let app = TestApp::new();
    let id = app.completed_job("private report").await;
    app.post_multipart(
        &format!("/api/v1/jobs/{id}/artifacts"),
        &worker_token(),
        report_form(),
    )
    .await;

    let response = app
        .get(&format!("/api/v1/jobs/{id}/artifacts"), &other_org_member_token())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_job_removes_artifacts() {
    let app = TestApp::new();
    let id = app.completed_job("cleanup files").await;
    let json = body_json(
        app.post_multipart(
            &format!("/api/v1/jobs/{id}/artifacts"),
            &worker_token(),
            report_form(),
        )
        .await,
    )
    .await;
    let storage_path = json["data"]["storage_path"].as_str().unwrap().to_string();
    let file = app.state.config.artifact_root.join(&storage_path);
    assert!(file.exists());

    let response = app.delete(&format!("/api/v1/jobs/{id}"), &member_token()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!file.exists());
}
