#![deny(unsafe_code)]

pub mod config;
pub mod error;

pub use config::{ServiceConfig, StorageBackend};
pub use error::{ApiError, ServiceError, ServiceResult};

use accord_adapters::{
    HttpComplianceClient, HttpExtractionClient, RuleBasedComplianceService,
    StaticExtractionService,
};
use accord_core::{
    AnswerOutcome, CollectionOrchestrator, CompliancePolicyService, ContractDocument,
    ExtractionService, FieldRegistry, ModificationOutcome, ReconcileReport, SessionStatus,
    StartOutcome, Stores,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct ServiceState {
    pub orchestrator: Arc<CollectionOrchestrator>,
}

impl ServiceState {
    pub fn new(orchestrator: CollectionOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Wire stores and integrations from configuration.
    pub fn bootstrap(config: ServiceConfig) -> ServiceResult<Self> {
        let ServiceConfig {
            storage,
            data_dir,
            extraction_url,
            compliance_url,
            fixtures_path,
            orchestrator,
            policy,
            ..
        } = config;

        let stores = match storage {
            StorageBackend::File => {
                std::fs::create_dir_all(&data_dir)?;
                Stores::file(data_dir.clone())
            }
            StorageBackend::Memory => Stores::in_memory(),
        };

        let extraction: Arc<dyn ExtractionService> = match (extraction_url, fixtures_path) {
            (Some(url), _) => {
                info!(url = %url, "using remote extraction service");
                Arc::new(HttpExtractionClient::new(
                    &url,
                    orchestrator.extraction_timeout(),
                )?)
            }
            (None, Some(path)) => {
                let fixtures = StaticExtractionService::load(&path)?;
                info!(path = %path.display(), subjects = fixtures.subjects().count(), "using extraction fixtures");
                Arc::new(fixtures)
            }
            (None, None) => {
                info!("no extraction source configured; every start will report missing fields");
                Arc::new(StaticExtractionService::default())
            }
        };

        let compliance: Arc<dyn CompliancePolicyService> = match compliance_url {
            Some(url) => {
                info!(url = %url, "using remote compliance service");
                Arc::new(HttpComplianceClient::new(
                    &url,
                    orchestrator.compliance_timeout(),
                )?)
            }
            None => {
                info!(policy_version = %policy.policy_version, "using built-in compliance rules");
                Arc::new(RuleBasedComplianceService::new(policy))
            }
        };

        info!(backend = storage.name(), data_dir = %data_dir.display(), "stores ready");
        Ok(Self::new(CollectionOrchestrator::new(
            Arc::new(FieldRegistry::standard()),
            stores,
            extraction,
            compliance,
            orchestrator,
        )))
    }

    pub fn backend(&self) -> &'static str {
        self.orchestrator.stores().backend()
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/sessions/:subject", get(session_status))
        .route("/v1/sessions/:subject/start", post(start_session))
        .route("/v1/sessions/:subject/answer", post(submit_answer))
        .route("/v1/sessions/:subject/corrections", post(correct_field))
        .route("/v1/sessions/:subject/reconcile", post(reconcile_session))
        .route("/v1/contracts/:subject", get(get_contract))
        .route("/v1/contracts/:subject/modifications", post(request_modification))
        .route("/v1/contracts/:subject/sign", post(sign_contract))
        .route("/v1/contracts/:subject/reject", post(reject_contract))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    store_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "accord-service",
        store_backend: state.backend(),
    })
}

#[derive(Debug, Clone, Deserialize)]
struct AnswerRequest {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldValueRequest {
    field: String,
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SignRequest {
    signer: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RejectRequest {
    reason: String,
}

async fn start_session(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<StartOutcome>, ApiError> {
    Ok(Json(state.orchestrator.start_or_resume(&subject).await?))
}

async fn submit_answer(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
    Json(answer): Json<AnswerRequest>,
) -> Result<Json<AnswerOutcome>, ApiError> {
    Ok(Json(
        state
            .orchestrator
            .submit_answer(&subject, &answer.text)
            .await?,
    ))
}

async fn session_status(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<SessionStatus>, ApiError> {
    Ok(Json(state.orchestrator.status(&subject).await?))
}

async fn correct_field(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
    Json(correction): Json<FieldValueRequest>,
) -> Result<Json<SessionStatus>, ApiError> {
    Ok(Json(
        state
            .orchestrator
            .correct_extracted_field(&subject, &correction.field, &correction.value)
            .await?,
    ))
}

async fn reconcile_session(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<ReconcileReport>, ApiError> {
    Ok(Json(state.orchestrator.reconcile(&subject).await?))
}

async fn get_contract(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<ContractDocument>, ApiError> {
    Ok(Json(state.orchestrator.document(&subject).await?))
}

async fn request_modification(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
    Json(change): Json<FieldValueRequest>,
) -> Result<Response, ApiError> {
    let outcome = state
        .orchestrator
        .request_modification(&subject, &change.field, &change.value)
        .await?;
    let status = match outcome {
        ModificationOutcome::NotReady { .. } => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)).into_response())
}

async fn sign_contract(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
    Json(request): Json<SignRequest>,
) -> Result<Json<ContractDocument>, ApiError> {
    if request.signer.trim().is_empty() {
        return Err(ApiError::bad_request("signer is required"));
    }
    Ok(Json(state.orchestrator.sign(&subject, &request.signer).await?))
}

async fn reject_contract(
    Path(subject): Path<String>,
    State(state): State<ServiceState>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<ContractDocument>, ApiError> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::bad_request("reason is required"));
    }
    Ok(Json(state.orchestrator.reject(&subject, &request.reason).await?))
}
