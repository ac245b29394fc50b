#![allow(dead_code)]

use accord_core::{
    AccordError, CollectionOrchestrator, CollectionState, CollectionStateStore,
    ComplianceRequest, ComplianceVerdict, CompliancePolicyService, ContractDocument, DocumentIdentity, DocumentStore,
    ExtractionRequest, ExtractionResponse, ExtractionService, FieldRegistry, InMemoryStore,
    IntegrationError, OrchestratorConfig, RulePolicyEngine, StoreError, Stores,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ANSWERS: [(&str, &str); 7] = [
    ("full_name", "John Doe"),
    ("national_id", "123456789012"),
    ("nationality", "spanish"),
    ("birth_date", "07/04/1990"),
    ("bank_name", "BBVA"),
    ("account_holder", "John Doe"),
    ("account_number", "0049 1500 0512"),
];

/// Retrieval fixture keyed by subject.
#[derive(Default)]
pub struct FixtureExtraction {
    records: BTreeMap<String, BTreeMap<String, Option<String>>>,
    pub calls: AtomicUsize,
}

impl FixtureExtraction {
    pub fn with_subject(mut self, subject_id: &str, values: &[(&str, Option<&str>)]) -> Self {
        self.records.insert(
            subject_id.to_string(),
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
        );
        self
    }

    pub fn complete(subject_id: &str) -> Self {
        Self::default().with_subject(
            subject_id,
            &[
                ("position", Some("Software Engineer")),
                ("department", Some("Platform")),
                ("start_date", Some("2026-11-02")),
            ],
        )
    }
}

#[async_trait]
impl ExtractionService for FixtureExtraction {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResponse, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractionResponse {
            values: self
                .records
                .get(&request.subject_id)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

pub struct SlowExtraction;

#[async_trait]
impl ExtractionService for SlowExtraction {
    async fn extract(
        &self,
        _request: ExtractionRequest,
    ) -> Result<ExtractionResponse, IntegrationError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ExtractionResponse::default())
    }
}

pub struct PolicyCompliance(pub RulePolicyEngine);

#[async_trait]
impl CompliancePolicyService for PolicyCompliance {
    async fn evaluate(
        &self,
        request: ComplianceRequest,
    ) -> Result<ComplianceVerdict, IntegrationError> {
        Ok(self.0.evaluate(&request))
    }
}

pub struct SlowCompliance;

#[async_trait]
impl CompliancePolicyService for SlowCompliance {
    async fn evaluate(
        &self,
        _request: ComplianceRequest,
    ) -> Result<ComplianceVerdict, IntegrationError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(IntegrationError::Transport("unreachable".to_string()))
    }
}

/// Document store whose saves can be made to fail on demand.
pub struct FlakyDocuments {
    inner: InMemoryStore,
    pub fail_saves: AtomicBool,
}

impl FlakyDocuments {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_saves: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyDocuments {
    async fn load_document(&self, subject_id: &str) -> Result<Option<ContractDocument>, StoreError> {
        self.inner.load_document(subject_id).await
    }

    async fn save_document(&self, document: &ContractDocument) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected document failure".to_string()));
        }
        self.inner.save_document(document).await
    }

    async fn delete_document(&self, subject_id: &str) -> Result<(), StoreError> {
        self.inner.delete_document(subject_id).await
    }

    async fn identities(&self, subject_id: &str) -> Result<Vec<DocumentIdentity>, StoreError> {
        self.inner.identities(subject_id).await
    }
}

/// State store whose next `fail_deletes` deletions fail.
pub struct FlakyStates {
    inner: InMemoryStore,
    pub fail_deletes: AtomicUsize,
}

impl FlakyStates {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_deletes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CollectionStateStore for FlakyStates {
    async fn load_state(&self, subject_id: &str) -> Result<Option<CollectionState>, StoreError> {
        self.inner.load_state(subject_id).await
    }

    async fn save_state(&self, state: &CollectionState) -> Result<u64, StoreError> {
        self.inner.save_state(state).await
    }

    async fn delete_state(&self, subject_id: &str) -> Result<(), StoreError> {
        let armed = self
            .fail_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(StoreError::Backend("injected delete failure".to_string()));
        }
        self.inner.delete_state(subject_id).await
    }
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        extraction_timeout_ms: 200,
        compliance_timeout_ms: 200,
        ..OrchestratorConfig::default()
    }
}

pub fn orchestrator(
    stores: Stores,
    extraction: Arc<dyn ExtractionService>,
    config: OrchestratorConfig,
) -> CollectionOrchestrator {
    CollectionOrchestrator::new(
        Arc::new(FieldRegistry::standard()),
        stores,
        extraction,
        Arc::new(PolicyCompliance(RulePolicyEngine::default())),
        config,
    )
}

/// Drive a subject from start to a finalized contract.
pub async fn finalize_subject(
    orchestrator: &CollectionOrchestrator,
    subject_id: &str,
) -> Result<ContractDocument, AccordError> {
    orchestrator.start_or_resume(subject_id).await?;
    let mut last = None;
    for (_, answer) in ANSWERS {
        last = Some(orchestrator.submit_answer(subject_id, answer).await?);
    }
    match last {
        Some(accord_core::AnswerOutcome::Finalized { document, .. }) => Ok(*document),
        other => panic!("expected finalization, got {:?}", other),
    }
}
