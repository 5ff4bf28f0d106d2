//! End-to-end flows over a real TCP listener, driven through
//! `jobhub_client`: a member submits and watches a fairness assessment
//! while a worker executes it.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use common::{admin_token, member_token, worker_token, TestApp};
use jobhub_client::{
    ClientError, CredentialProvider, JobsClient, ListJobs, MonitorOutcome, ProgressMonitor,
    StaticToken,
};
use jobhub_core::job::JobStatus;
use jobhub_core::model::SubmitJob;
use tokio_util::sync::CancellationToken;

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server");
    });
    format!("http://{addr}")
}

fn client(base: &str, token: String) -> JobsClient {
    JobsClient::new(base, Arc::new(StaticToken::new(token)))
}

fn fairness_check() -> SubmitJob {
    SubmitJob {
        name: "Fairness Check A".into(),
        description: Some("Demographic parity on loan model v3".into()),
        job_type: "fairness_assessment".into(),
        parameters: Some(serde_json::json!({ "model_id": 3, "protected": ["age", "sex"] })),
        priority: Some(1),
        scheduled_at: None,
    }
}

#[tokio::test]
async fn fairness_check_end_to_end() {
    let app = TestApp::new();
    let base = serve(&app).await;
    let member = client(&base, member_token());
    let worker = client(&base, worker_token());

    let job = member.submit(&fairness_check()).await.expect("submit");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempt, 1);

    // Executor: start, report progress, complete, attach the report.
    let executor = {
        let worker = worker.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            worker.start(job_id).await.expect("start");
            for percent in [25, 50, 75] {
                tokio::time::sleep(Duration::from_millis(20)).await;
                worker
                    .report_progress(job_id, percent)
                    .await
                    .expect("progress");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            worker
                .complete(job_id, Some(serde_json::json!({ "parity_gap": 0.04 })))
                .await
                .expect("complete")
        })
    };

    let mut observed = Vec::new();
    let outcome = ProgressMonitor::new()
        .with_interval(Duration::from_millis(5))
        .watch(
            &member,
            job.id,
            |j| observed.push((j.status, j.progress)),
            &CancellationToken::new(),
        )
        .await
        .expect("monitor");

    let finished = assert_matches!(outcome, MonitorOutcome::Finished(j) => j);
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.progress, 100);
    assert_eq!(finished.result, Some(serde_json::json!({ "parity_gap": 0.04 })));
    assert!(observed.windows(2).all(|w| w[0].1 <= w[1].1), "{observed:?}");
    assert_eq!(observed.last(), Some(&(JobStatus::Completed, 100)));
    executor.await.expect("executor task");

    let report = b"fairness report: parity gap 0.04".as_slice();
    let recorded = worker
        .record_artifact(job.id, "report", "fairness-check-a.txt", Some("text/plain"), report)
        .await
        .expect("record artifact");
    assert_eq!(recorded.artifact.content_type, "text/plain");
    assert_eq!(recorded.artifact.file_size, report.len() as i64);

    let artifacts = member.list_artifacts(job.id).await.expect("artifacts");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].artifact.artifact_type, "report");
    assert_eq!(artifacts[0].download_url, recorded.download_url);
    let bytes = member
        .download_artifact(job.id, artifacts[0].artifact.id)
        .await
        .expect("download");
    assert_eq!(bytes, report);

    let stats = member.stats().await.expect("stats");
    assert_eq!(stats.total, 1);
    assert_eq!(stats.success_rate, Some(1.0));
}

#[tokio::test]
async fn cancel_twice_then_retry_then_cleanup() {
    let app = TestApp::new();
    let base = serve(&app).await;
    let member = client(&base, member_token());
    let admin = client(&base, admin_token());

    let job = member.submit(&fairness_check()).await.expect("submit");

    let cancelled = member
        .cancel(job.id, Some("wrong model".into()))
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("wrong model"));

    let again = member.cancel(job.id, None).await;
    assert_matches!(again, Err(ClientError::Conflict(_)));

    let retry = member
        .retry(job.id, Some(serde_json::json!({ "model_id": 4 })))
        .await
        .expect("retry");
    assert_eq!(retry.status, JobStatus::Pending);
    assert_eq!(retry.attempt, 2);
    assert_eq!(retry.retry_of_job_id, Some(job.id));
    assert_eq!(retry.parameters, serde_json::json!({ "model_id": 4 }));

    let page = member
        .list(&ListJobs {
            sort_by: Some("created_at".into()),
            sort_desc: Some(false),
            ..Default::default()
        })
        .await
        .expect("list");
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].id, job.id);
    assert_eq!(page.items[1].id, retry.id);

    let forbidden = member.cleanup(30).await;
    assert_matches!(forbidden, Err(ClientError::Forbidden(_)));

    let result = admin.cleanup(30).await.expect("cleanup");
    assert_eq!(result.deleted_count, 0);
    assert_eq!(member.list(&ListJobs::default()).await.unwrap().total, 2);
}

#[tokio::test]
async fn monitor_stops_on_timeout_and_cancellation_detaches() {
    let app = TestApp::new();
    let base = serve(&app).await;
    let member = client(&base, member_token());
    let worker = client(&base, worker_token());
    let monitor = ProgressMonitor::new().with_interval(Duration::from_millis(5));

    // A job that times out is terminal for the monitor.
    let slow = member.submit(&fairness_check()).await.expect("submit");
    worker.start(slow.id).await.expect("start");
    worker.time_out(slow.id).await.expect("timeout");
    let outcome = monitor
        .watch(&member, slow.id, |_| {}, &CancellationToken::new())
        .await
        .expect("monitor");
    let timed_out = assert_matches!(outcome, MonitorOutcome::Finished(j) => j);
    assert_eq!(timed_out.status, JobStatus::Timeout);
    assert!(timed_out.error_message.is_none());

    // Cancelling the token stops watching without touching the job.
    let waiting = member.submit(&fairness_check()).await.expect("submit").id;
    let cancel = CancellationToken::new();
    let watcher = {
        let member = member.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { monitor.watch(&member, waiting, |_| {}, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let outcome = watcher.await.expect("join").expect("monitor");
    assert_matches!(
        outcome,
        MonitorOutcome::Detached { last_seen: Some(j) } if j.status == JobStatus::Pending
    );
    let job = member.get(waiting).await.expect("get");
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn missing_job_is_not_found_for_monitor() {
    let app = TestApp::new();
    let base = serve(&app).await;
    let member = client(&base, member_token());

    let result = ProgressMonitor::new()
        .with_interval(Duration::from_millis(5))
        .watch(&member, 424242, |_| {}, &CancellationToken::new())
        .await;

    assert_matches!(result, Err(ClientError::NotFound(_)));
}

/// Hands out an expired token first and a valid one on refresh.
struct ExpiringLogin {
    current: Mutex<String>,
    fresh: String,
    refreshes: AtomicUsize,
}

#[async_trait::async_trait]
impl CredentialProvider for ExpiringLogin {
    async fn token(&self) -> Result<String, ClientError> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn refresh(&self) -> Result<String, ClientError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().unwrap();
        *current = self.fresh.clone();
        Ok(current.clone())
    }
}

#[tokio::test]
async fn expired_session_is_refreshed_transparently() {
    let app = TestApp::new();
    let base = serve(&app).await;

    let expired = jobhub_api::auth::jwt::generate_access_token(
        10,
        common::ORG,
        jobhub_core::roles::ROLE_MEMBER,
        &jobhub_api::auth::jwt::JwtConfig {
            secret: common::TEST_JWT_SECRET.into(),
            access_token_expiry_mins: -10,
        },
    )
    .unwrap();
    let login = Arc::new(ExpiringLogin {
        current: Mutex::new(expired),
        fresh: member_token(),
        refreshes: AtomicUsize::new(0),
    });
    let member = JobsClient::new(&base, login.clone());

    let job = member.submit(&fairness_check()).await.expect("submit after refresh");
    assert_eq!(job.created_by, 10);
    assert_eq!(login.refreshes.load(Ordering::SeqCst), 1);

    member.get(job.id).await.expect("get");
    assert_eq!(login.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn artifact_upload_is_replayed_after_refresh() {
    let app = TestApp::new();
    let base = serve(&app).await;
    let member = client(&base, member_token());
    let worker = client(&base, worker_token());

    let job = member.submit(&fairness_check()).await.expect("submit");
    worker.start(job.id).await.expect("start");
    worker.complete(job.id, None).await.expect("complete");

    let expired = jobhub_api::auth::jwt::generate_access_token(
        20,
        common::ORG,
        jobhub_core::roles::ROLE_WORKER,
        &jobhub_api::auth::jwt::JwtConfig {
            secret: common::TEST_JWT_SECRET.into(),
            access_token_expiry_mins: -10,
        },
    )
    .unwrap();
    let login = Arc::new(ExpiringLogin {
        current: Mutex::new(expired),
        fresh: worker_token(),
        refreshes: AtomicUsize::new(0),
    });
    let uploader = JobsClient::new(&base, login.clone());

    let recorded = uploader
        .record_artifact(job.id, "evidence_pack", "pack.zip", None, b"PK\x03\x04")
        .await
        .expect("upload after refresh");

    assert_eq!(login.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(recorded.artifact.content_type, "application/octet-stream");
    let artifacts = member.list_artifacts(job.id).await.expect("artifacts");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].artifact.file_name, "pack.zip");
}
