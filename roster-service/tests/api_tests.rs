use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use roster_service::{
    api::{handler::jobs, handler::solve, state::AppState},
    config::ServiceConfig,
    domain::{
        cache::MockEmployeeCountCache,
        job::{JobRecord, JobStatus, MockJobStore},
        notify::MockWebhookNotifier,
        service::SolveService,
    },
};

fn build_test_app(mock_store: MockJobStore) -> Router {
    let mut cache = MockEmployeeCountCache::new();
    cache.expect_get().returning(|_| None);
    cache.expect_put().returning(|_, _| ());

    let svc = Arc::new(SolveService::new(
        Arc::new(mock_store),
        Arc::new(MockWebhookNotifier::new()),
        Arc::new(cache),
        ServiceConfig::default(),
    ));
    let state = Arc::new(AppState { solve_service: svc });

    Router::new()
        .route("/api/v1/solve", post(solve::solve))
        .route("/api/v1/jobs", post(jobs::submit))
        .route("/api/v1/jobs/{job_id}/status", get(jobs::status))
        .route("/api/v1/jobs/{job_id}/result", get(jobs::result))
        .route("/api/v1/jobs/{job_id}/cancel", post(jobs::cancel))
        .with_state(state)
}

fn make_record(job_id: &str, status: JobStatus) -> JobRecord {
    JobRecord {
        job_id: job_id.into(),
        status,
        created_at: chrono::Utc::now(),
        started_at: None,
        completed_at: None,
        error_message: None,
        result_available: false,
        result_size_bytes: None,
        webhook_url: None,
        cancel_requested: false,
    }
}

fn solve_input() -> serde_json::Value {
    json!({
        "planningHorizon": {"startDate": "2026-01-05", "endDate": "2026-01-11"},
        "demandItems": [{
            "demandId": "D1",
            "shifts": [{
                "shiftDetails": [{"shiftCode": "D", "start": "08:00", "end": "16:00"}]
            }],
            "requirements": [{
                "requirementId": "R1",
                "headcount": 1,
                "workPattern": ["D", "D", "O"],
                "icpmpBufferPercentage": 0
            }]
        }],
        "employees": (0..4).map(|i| json!({
            "employeeId": format!("E{i}"), "scheme": "Scheme A"
        })).collect::<Vec<_>>(),
        "solverRunTime": {"maxSeconds": 2}
    })
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn sync_solve_returns_full_output() {
    let app = build_test_app(MockJobStore::new());
    let (status, body) = post_json(app, "/api/v1/solve", solve_input()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("solverRun").is_some());
    assert!(body.get("assignments").is_some());
    assert!(body.get("employeeRoster").is_some());
    assert!(body["meta"]["inputHash"].as_str().unwrap().starts_with("sha256:"));
}

#[tokio::test]
async fn sync_solve_rejects_invalid_input_with_field_errors() {
    let app = build_test_app(MockJobStore::new());
    let bad = json!({
        "planningHorizon": {"startDate": "2026-02-01", "endDate": "2026-01-01"},
        "demandItems": [],
        "employees": []
    });
    let (status, body) = post_json(app, "/api/v1/solve", bad).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    let fields: Vec<&str> = body["fieldErrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"planningHorizon"));
    assert!(fields.contains(&"demandItems"));
}

#[tokio::test]
async fn submit_returns_202_with_job_id() {
    let mut store = MockJobStore::new();
    store
        .expect_enqueue()
        .returning(|_, _| Ok(make_record("J1", JobStatus::Queued)));
    let app = build_test_app(store);

    let (status, body) = post_json(
        app,
        "/api/v1/jobs",
        json!({"input": solve_input()}),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["jobId"], "J1");
    assert_eq!(body["data"]["status"], "queued");
    assert!(body["data"]["feasibilityCheck"]["estimatedVariables"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn status_of_unknown_job_is_404() {
    let mut store = MockJobStore::new();
    store.expect_get_job().returning(|_| Ok(None));
    let app = build_test_app(store);

    let (status, body) = get_json(app, "/api/v1/jobs/nope/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn result_retrieval_status_codes() {
    let mut store = MockJobStore::new();
    store.expect_get_job().returning(|job_id| {
        Ok(match job_id {
            "done" => Some(make_record("done", JobStatus::Completed)),
            "gone" => Some(make_record("gone", JobStatus::Expired)),
            "slow" => Some(make_record("slow", JobStatus::Queued)),
            _ => None,
        })
    });
    store
        .expect_get_result()
        .returning(|_| Ok(Some(json!({"schemaVersion": "0.4"}))));

    let app = build_test_app(store);
    let (status, body) = get_json(app.clone(), "/api/v1/jobs/done/result").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schemaVersion"], "0.4");

    let (status, _) = get_json(app.clone(), "/api/v1/jobs/gone/result").await;
    assert_eq!(status, StatusCode::GONE);

    let (status, _) = get_json(app.clone(), "/api/v1/jobs/slow/result").await;
    assert_eq!(status, StatusCode::TOO_EARLY);

    let (status, _) = get_json(app, "/api/v1/jobs/unknown/result").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_flags_the_job() {
    let mut store = MockJobStore::new();
    store.expect_request_cancel().returning(|_| Ok(true));
    store.expect_get_job().returning(|_| {
        let mut record = make_record("J1", JobStatus::Queued);
        record.cancel_requested = true;
        Ok(Some(record))
    });
    let app = build_test_app(store);

    let (status, body) = post_json(app, "/api/v1/jobs/J1/cancel", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cancelRequested"], true);
}
