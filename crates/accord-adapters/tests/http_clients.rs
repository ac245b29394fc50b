use accord_adapters::{HttpComplianceClient, HttpExtractionClient};
use accord_core::{
    ComplianceRequest, ComplianceVerdict, CompliancePolicyService, ExtractionRequest,
    ExtractionResponse, ExtractionService, IntegrationError, RiskLevel,
};
use axum::{http::StatusCode, routing::post, Json, Router};
use std::collections::BTreeMap;
use std::time::Duration;

async fn extract(Json(request): Json<ExtractionRequest>) -> Json<ExtractionResponse> {
    let values: BTreeMap<String, Option<String>> = request
        .fields
        .into_iter()
        .map(|field| {
            let value = (field == "position").then(|| format!("Engineer for {}", request.subject_id));
            (field, value)
        })
        .collect();
    Json(ExtractionResponse { values })
}

async fn evaluate(Json(request): Json<ComplianceRequest>) -> Json<ComplianceVerdict> {
    Json(ComplianceVerdict {
        approved: request.proposed_value == "38",
        risk_level: RiskLevel::Low,
        reasons: vec![format!("checked {}", request.field)],
    })
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

#[tokio::test]
async fn extraction_client_posts_requested_fields() {
    let base = spawn(Router::new().route("/v1/extract", post(extract))).await;
    let client = HttpExtractionClient::new(&base, Duration::from_secs(2)).unwrap();

    let subject_id = format!("emp-{}", uuid::Uuid::new_v4());
    let response = client
        .extract(ExtractionRequest {
            subject_id: subject_id.clone(),
            fields: vec!["position".to_string(), "department".to_string()],
        })
        .await
        .unwrap();

    assert_eq!(
        response.values["position"].as_deref(),
        Some(format!("Engineer for {}", subject_id).as_str())
    );
    assert_eq!(response.values["department"], None);
}

#[tokio::test]
async fn compliance_client_decodes_verdict() {
    let base = spawn(Router::new().route("/v1/evaluate", post(evaluate))).await;
    let client = HttpComplianceClient::new(&base, Duration::from_secs(2)).unwrap();

    let verdict = client
        .evaluate(ComplianceRequest {
            field: "weekly_hours".to_string(),
            proposed_value: "38".to_string(),
            jurisdiction: "ES".to_string(),
        })
        .await
        .unwrap();
    assert!(verdict.approved);
    assert_eq!(verdict.reasons, vec!["checked weekly_hours".to_string()]);
}

#[tokio::test]
async fn non_success_status_is_surfaced() {
    let app = Router::new().route(
        "/v1/evaluate",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "policy engine warming up") }),
    );
    let base = spawn(app).await;
    let client = HttpComplianceClient::new(&base, Duration::from_secs(2)).unwrap();

    let err = client
        .evaluate(ComplianceRequest {
            field: "weekly_hours".to_string(),
            proposed_value: "38".to_string(),
            jurisdiction: "ES".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        IntegrationError::Status {
            status: 503,
            body: "policy engine warming up".to_string(),
        }
    );
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let app = Router::new().route("/v1/extract", post(|| async { "not json" }));
    let base = spawn(app).await;
    let client = HttpExtractionClient::new(&base, Duration::from_secs(2)).unwrap();

    let err = client
        .extract(ExtractionRequest {
            subject_id: "emp-1".to_string(),
            fields: vec!["position".to_string()],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IntegrationError::Decode(_)));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        HttpExtractionClient::new(&format!("http://{}", addr), Duration::from_millis(500)).unwrap();
    let err = client
        .extract(ExtractionRequest {
            subject_id: "emp-1".to_string(),
            fields: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IntegrationError::Transport(_)));
}
