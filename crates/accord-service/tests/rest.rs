use accord_adapters::{RuleBasedComplianceService, StaticExtractionService};
use accord_core::{CollectionOrchestrator, FieldRegistry, OrchestratorConfig, Stores};
use accord_service::{build_router, ServiceConfig, ServiceState, StorageBackend};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const ANSWERS: [&str; 7] = [
    "John Doe",
    "123456789012",
    "spanish",
    "07/04/1990",
    "BBVA",
    "John Doe",
    "0049 1500 0512",
];

fn app(subjects: &[&str]) -> Router {
    let mut extraction = StaticExtractionService::default();
    for subject in subjects {
        extraction = extraction.with_subject(
            subject,
            [
                ("position", "Software Engineer"),
                ("department", "Platform"),
                ("start_date", "2026-11-02"),
            ],
        );
    }
    let orchestrator = CollectionOrchestrator::new(
        Arc::new(FieldRegistry::standard()),
        Stores::in_memory(),
        Arc::new(extraction),
        Arc::new(RuleBasedComplianceService::default()),
        OrchestratorConfig::default(),
    );
    build_router(ServiceState::new(orchestrator))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_store_backend() {
    let app = app(&[]);
    let (status, body) = call(&app, "GET", "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store_backend"], "memory");
}

#[tokio::test]
async fn interview_round_trip_to_signed_contract() {
    let app = app(&["emp-1"]);

    let (status, body) = call(&app, "POST", "/v1/sessions/emp-1/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "question");
    assert_eq!(body["question"]["field"], "full_name");
    assert_eq!(body["question"]["progress"]["collected"], 3);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/sessions/emp-1/answer",
        Some(json!({ "text": "John" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "validation_error");
    assert_eq!(body["question"]["field"], "full_name");

    let mut last = Value::Null;
    for answer in ANSWERS {
        let (status, body) = call(
            &app,
            "POST",
            "/v1/sessions/emp-1/answer",
            Some(json!({ "text": answer })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        last = body;
    }
    assert_eq!(last["outcome"], "finalized");
    assert_eq!(last["document"]["status"], "ready_for_signature");
    assert_eq!(last["document"]["progress"]["collected_fields"], 10);

    let (status, body) = call(&app, "GET", "/v1/contracts/emp-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sections"]["identity"]["national_id"], "1234-5678-9012");

    let (status, body) = call(
        &app,
        "POST",
        "/v1/contracts/emp-1/modifications",
        Some(json!({ "field": "remote_days", "value": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "approved");
    assert_eq!(body["document"]["sections"]["terms"]["remote_days"], "2");

    let (status, body) = call(
        &app,
        "POST",
        "/v1/contracts/emp-1/sign",
        Some(json!({ "signer": "Jane Roe, HR" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "signed");

    let (status, _) = call(
        &app,
        "POST",
        "/v1/contracts/emp-1/modifications",
        Some(json!({ "field": "remote_days", "value": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn incomplete_extraction_is_an_outcome_not_an_error() {
    let app = app(&[]);
    let (status, body) = call(&app, "POST", "/v1/sessions/emp-9/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "extraction_failure");
    assert_eq!(
        body["missing_fields"],
        json!(["position", "department", "start_date"])
    );

    let (status, body) = call(&app, "GET", "/v1/sessions/emp-9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("emp-9"));
    assert_eq!(body["start"], "/v1/sessions/emp-9/start");
}

#[tokio::test]
async fn error_statuses_follow_the_taxonomy() {
    let app = app(&["emp-2"]);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/sessions/emp-2/answer",
        Some(json!({ "text": "John Doe" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["start"], "/v1/sessions/emp-2/start");

    call(&app, "POST", "/v1/sessions/emp-2/start", None).await;

    let (status, body) = call(
        &app,
        "POST",
        "/v1/contracts/emp-2/modifications",
        Some(json!({ "field": "weekly_hours", "value": "38" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["outcome"], "not_ready");

    let (status, _) = call(
        &app,
        "POST",
        "/v1/sessions/emp-2/corrections",
        Some(json!({ "field": "position", "value": "Staff Engineer" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/contracts/emp-2/sign",
        Some(json!({ "signer": "Jane Roe" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/contracts/emp-2/reject",
        Some(json!({ "reason": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("start").is_none());

    let (status, body) = call(&app, "GET", "/v1/sessions/emp-2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "collecting");
    assert_eq!(body["pending_question"]["field"], "full_name");
}

#[tokio::test]
async fn reconcile_reports_nothing_to_replay_on_a_clean_session() {
    let app = app(&["emp-3"]);
    call(&app, "POST", "/v1/sessions/emp-3/start", None).await;

    let (status, body) = call(&app, "POST", "/v1/sessions/emp-3/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject_id"], "emp-3");
    assert_eq!(body["cleared_intent"], false);
}

#[tokio::test]
async fn bootstrap_with_file_backend_persists_under_data_dir() {
    let data_dir = std::env::temp_dir().join(format!("accord-service-{}", Uuid::new_v4()));
    let fixtures = data_dir.join("fixtures.json");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(
        &fixtures,
        json!({
            "subjects": {
                "emp-4": {
                    "position": "Analyst",
                    "department": "Finance",
                    "start_date": "2026-12-01"
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    let state = ServiceState::bootstrap(ServiceConfig {
        storage: StorageBackend::File,
        data_dir: data_dir.clone(),
        fixtures_path: Some(fixtures),
        ..ServiceConfig::default()
    })
    .unwrap();
    assert_eq!(state.backend(), "file");
    let app = build_router(state);

    let (status, body) = call(&app, "POST", "/v1/sessions/emp-4/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "question");
    assert!(data_dir.join("documents").join("template-emp-4.json").exists());
}
