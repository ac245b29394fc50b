//! Collection orchestrator: the conversational façade over extraction, interview,
//! triple persistence, finalization and negotiation.
//!
//! Every operation that touches a subject runs under that subject's async mutex. The
//! collection state is the authoritative record; the document and the profile are
//! projections of it, kept convergent through a write-ahead intent and [`reconcile`].
//!
//! [`reconcile`]: CollectionOrchestrator::reconcile

use crate::compliance::CompliancePolicyService;
use crate::config::{CorrectionPolicy, OrchestratorConfig};
use crate::error::{AccordError, Result, StoreError, StoreKind, StoreResult};
use crate::extraction::{Extraction, ExtractionAdapter, ExtractionService};
use crate::finalize::FinalizationEngine;
use crate::flow::advance_phase;
use crate::guard::SubjectLocks;
use crate::negotiate::NegotiationEngine;
use crate::projection::ProfileProjector;
use crate::schema::{FieldDefinition, FieldRegistry};
use crate::storage::Stores;
use crate::types::{
    AnswerOutcome, CollectionPhase, CollectionState, ContractDocument, DocumentStatus,
    ModificationOutcome, Question, ReconcileReport, SessionStatus, SigningAffordance,
    StartOutcome,
};
use crate::validate::normalize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct CollectionOrchestrator {
    registry: Arc<FieldRegistry>,
    stores: Stores,
    projector: ProfileProjector,
    extraction: ExtractionAdapter,
    finalization: FinalizationEngine,
    negotiation: NegotiationEngine,
    config: OrchestratorConfig,
    locks: SubjectLocks,
}

impl CollectionOrchestrator {
    pub fn new(
        registry: Arc<FieldRegistry>,
        stores: Stores,
        extraction: Arc<dyn ExtractionService>,
        compliance: Arc<dyn CompliancePolicyService>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            projector: ProfileProjector::new(stores.profiles.clone()),
            extraction: ExtractionAdapter::new(
                extraction,
                registry.clone(),
                config.extraction_timeout(),
            ),
            finalization: FinalizationEngine::new(stores.clone(), registry.clone()),
            negotiation: NegotiationEngine::new(
                stores.clone(),
                registry.clone(),
                compliance,
                config.compliance_timeout(),
                config.jurisdiction.clone(),
            ),
            registry,
            stores,
            config,
            locks: SubjectLocks::new(),
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Start a new interview, or resume the subject's persisted one.
    #[instrument(skip(self))]
    pub async fn start_or_resume(&self, subject_id: &str) -> Result<StartOutcome> {
        let _turn = self.locks.acquire(subject_id).await;

        if let Some(state) = self.stores.states.load_state(subject_id).await? {
            if !state.collected_data.is_empty() {
                return self.resume(state).await;
            }
            warn!(subject_id = %subject_id, "discarding empty collection state");
            self.stores.states.delete_state(subject_id).await?;
        }

        if let Some(document) = self.stores.documents.load_document(subject_id).await? {
            if document.status != DocumentStatus::CollectingData {
                info!(subject_id = %subject_id, status = document.status.name(), "interview already finished");
                return Ok(finalized_start(document));
            }
        }

        self.start_fresh(subject_id).await
    }

    async fn start_fresh(&self, subject_id: &str) -> Result<StartOutcome> {
        let mut state = CollectionState::new(subject_id);
        advance_phase(&mut state, CollectionPhase::Extracting)?;
        info!(subject_id = %subject_id, session_id = %state.session_id, "extracting employment fields");

        let values = match self.extraction.extract(subject_id).await? {
            Extraction::Complete(values) => values,
            Extraction::Incomplete { missing } => {
                let message = format!(
                    "The employment record is missing {}. Ask HR to correct it through the records portal, then start again.",
                    missing.join(", ")
                );
                return Ok(StartOutcome::ExtractionFailure {
                    missing_fields: missing,
                    message,
                });
            }
        };

        state.seed(values.clone(), &self.registry);
        advance_phase(&mut state, CollectionPhase::Collecting)?;
        state.mark_pending(values);

        // State and document are created as one step: a failed document write removes the
        // state again so no half-created session survives.
        state.version = self
            .stores
            .states
            .save_state(&state)
            .await
            .map_err(|err| {
                log_persistence(subject_id, "*", StoreKind::CollectionState, &err);
                AccordError::persistence(subject_id, "*", StoreKind::CollectionState, err)
            })?;

        let document = self.rebuild_document(&state);
        if let Err(err) = self.stores.documents.save_document(&document).await {
            log_persistence(subject_id, "*", StoreKind::Document, &err);
            if let Err(cleanup) = self.stores.states.delete_state(subject_id).await {
                error!(subject_id = %subject_id, error = %cleanup, "could not remove state after failed document creation");
            }
            return Err(AccordError::persistence(
                subject_id,
                "*",
                StoreKind::Document,
                err,
            ));
        }

        if let Err(err) = self
            .projector
            .project_all(subject_id, &state.collected_data)
            .await
        {
            log_persistence(subject_id, "*", StoreKind::Profile, &err);
            return Err(AccordError::persistence(
                subject_id,
                "*",
                StoreKind::Profile,
                err,
            ));
        }
        self.clear_intent(&mut state).await;

        info!(
            subject_id = %subject_id,
            session_id = %state.session_id,
            missing = state.missing_fields.len(),
            "collection started"
        );

        if state.is_complete() {
            let document = self.finalization.finalize_state(state).await?;
            return Ok(finalized_start(document));
        }
        Ok(StartOutcome::Question {
            question: self.question_for(&state)?,
        })
    }

    async fn resume(&self, mut state: CollectionState) -> Result<StartOutcome> {
        let subject_id = state.subject_id.clone();

        // Repeated starts without an answer in between count as one resumption.
        if !state.resumed_since_answer {
            advance_phase(&mut state, CollectionPhase::Collecting)?;
            state.resume_count += 1;
            state.resumed_since_answer = true;
            state.touch();
            if state.pending_write.is_none() {
                state.version = self.stores.states.save_state(&state).await.map_err(|err| {
                    log_persistence(&subject_id, "*", StoreKind::CollectionState, &err);
                    AccordError::persistence(&subject_id, "*", StoreKind::CollectionState, err)
                })?;
            }
            info!(
                subject_id = %subject_id,
                session_id = %state.session_id,
                resume_count = state.resume_count,
                "collection resumed"
            );
        }
        if state.pending_write.is_some() {
            warn!(subject_id = %subject_id, "pending write found on resume, reconciling");
            self.reconcile_state(&mut state).await?;
        }

        if state.is_complete() {
            let document = self.finalization.finalize_state(state).await?;
            return Ok(finalized_start(document));
        }

        Ok(StartOutcome::ResumedQuestion {
            question: self.question_for(&state)?,
            resume_count: state.resume_count,
        })
    }

    /// Answer the pending question.
    #[instrument(skip(self, raw_input))]
    pub async fn submit_answer(&self, subject_id: &str, raw_input: &str) -> Result<AnswerOutcome> {
        let _turn = self.locks.acquire(subject_id).await;

        let mut state = self.load_collecting(subject_id).await?;

        // Nothing left to ask: finish (or settle) before reading the answer.
        if state.is_complete() {
            let document = self.finalization.finalize_state(state).await?;
            return Ok(finalized_answer(document));
        }
        if self.config.is_cancellation(raw_input) {
            return self.cancel(state).await;
        }
        if state.pending_write.is_some() {
            warn!(subject_id = %subject_id, "pending write found before answer, reconciling");
            self.reconcile_state(&mut state).await?;
        }

        let Some(key) = state.next_field().map(str::to_string) else {
            let document = self.finalization.finalize_state(state).await?;
            return Ok(finalized_answer(document));
        };
        let field = self.field(&key)?.clone();

        let value = match normalize(&field, raw_input) {
            Ok(value) => value,
            Err(error) => {
                warn!(subject_id = %subject_id, field = %key, reason = %error.reason, "answer rejected");
                let question = self.question_for(&state)?.with_hint(&field.hint);
                return Ok(AnswerOutcome::ValidationError { error, question });
            }
        };

        self.apply_value(&mut state, &field, &value).await?;
        info!(
            subject_id = %subject_id,
            field = %key,
            remaining = state.missing_fields.len(),
            "answer accepted"
        );

        if state.is_complete() {
            let document = self.finalization.finalize_state(state).await?;
            return Ok(finalized_answer(document));
        }
        Ok(AnswerOutcome::NextQuestion {
            question: self.question_for(&state)?,
        })
    }

    async fn cancel(&self, mut state: CollectionState) -> Result<AnswerOutcome> {
        let subject_id = state.subject_id.clone();
        advance_phase(&mut state, CollectionPhase::Cancelled)?;

        self.stores.states.delete_state(&subject_id).await?;
        if let Err(err) = self.stores.documents.delete_document(&subject_id).await {
            // A leftover template is overwritten by the next fresh start.
            warn!(subject_id = %subject_id, error = %err, "could not delete template on cancellation");
        }

        info!(subject_id = %subject_id, session_id = %state.session_id, "collection cancelled");
        Ok(AnswerOutcome::Cancelled {
            subject_id,
            message: "The contract interview was cancelled. Start again whenever you are ready."
                .to_string(),
        })
    }

    /// Overwrite a value that came from extraction, when the correction policy allows it.
    #[instrument(skip(self, value))]
    pub async fn correct_extracted_field(
        &self,
        subject_id: &str,
        field: &str,
        value: &str,
    ) -> Result<SessionStatus> {
        let _turn = self.locks.acquire(subject_id).await;

        let mut state = self.load_collecting(subject_id).await?;
        if self.config.correction_policy == CorrectionPolicy::TrustExtraction {
            warn!(subject_id = %subject_id, field = %field, "correction refused by policy");
            return Err(AccordError::CorrectionNotPermitted {
                field: field.to_string(),
                reason: "extracted values are authoritative; request the change through HR"
                    .to_string(),
            });
        }

        let definition = self.field(field)?.clone();
        if !state.extracted_fields.contains(field) {
            return Err(AccordError::CorrectionNotPermitted {
                field: field.to_string(),
                reason: "only extracted fields can be corrected".to_string(),
            });
        }
        let normalized = normalize(&definition, value)?;

        self.apply_value(&mut state, &definition, &normalized).await?;
        info!(subject_id = %subject_id, field = %field, "extracted field corrected");

        let document_status = self
            .stores
            .documents
            .load_document(subject_id)
            .await?
            .map(|document| document.status);
        self.status_of(&state, document_status)
    }

    /// Read-only view of where the subject stands.
    pub async fn status(&self, subject_id: &str) -> Result<SessionStatus> {
        let state = self.stores.states.load_state(subject_id).await?;
        let document = self.stores.documents.load_document(subject_id).await?;

        match (state, document) {
            (Some(state), document) => self.status_of(&state, document.map(|d| d.status)),
            (None, Some(document)) => Ok(SessionStatus {
                subject_id: subject_id.to_string(),
                phase: if document.status == DocumentStatus::CollectingData {
                    CollectionPhase::Uninitialized
                } else {
                    CollectionPhase::Finalized
                },
                progress: document.progress.clone(),
                resume_count: 0,
                pending_question: None,
                pending_write: false,
                document_status: Some(document.status),
            }),
            (None, None) => Err(AccordError::SessionNotFound(subject_id.to_string())),
        }
    }

    /// Replay collected values into the document and profile and clear any pending intent.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, subject_id: &str) -> Result<ReconcileReport> {
        let _turn = self.locks.acquire(subject_id).await;
        let mut state = self.load_collecting(subject_id).await?;
        self.reconcile_state(&mut state).await
    }

    /// Finalize explicitly; normally triggered by the last accepted answer.
    #[instrument(skip(self))]
    pub async fn finalize(&self, subject_id: &str) -> Result<ContractDocument> {
        let _turn = self.locks.acquire(subject_id).await;
        self.finalization.finalize(subject_id).await
    }

    #[instrument(skip(self, requested_value))]
    pub async fn request_modification(
        &self,
        subject_id: &str,
        field: &str,
        requested_value: &str,
    ) -> Result<ModificationOutcome> {
        let _turn = self.locks.acquire(subject_id).await;
        self.negotiation
            .request_modification(subject_id, field, requested_value)
            .await
    }

    #[instrument(skip(self))]
    pub async fn sign(&self, subject_id: &str, signer: &str) -> Result<ContractDocument> {
        let _turn = self.locks.acquire(subject_id).await;
        self.finalization.sign(subject_id, signer).await
    }

    #[instrument(skip(self))]
    pub async fn reject(&self, subject_id: &str, reason: &str) -> Result<ContractDocument> {
        let _turn = self.locks.acquire(subject_id).await;
        self.finalization.reject(subject_id, reason).await
    }

    pub async fn document(&self, subject_id: &str) -> Result<ContractDocument> {
        self.stores
            .documents
            .load_document(subject_id)
            .await?
            .ok_or_else(|| AccordError::SessionNotFound(subject_id.to_string()))
    }

    /// The triple update: state (with intent), then document, then profile, then clear intent.
    async fn apply_value(
        &self,
        state: &mut CollectionState,
        field: &FieldDefinition,
        value: &str,
    ) -> Result<()> {
        let subject_id = state.subject_id.clone();
        let key = field.key.as_str();

        state.record(key, value);
        state.version = self.stores.states.save_state(state).await.map_err(|err| {
            log_persistence(&subject_id, key, StoreKind::CollectionState, &err);
            AccordError::persistence(&subject_id, key, StoreKind::CollectionState, err)
        })?;

        if let Err(err) = self.write_document_value(state, field, value).await {
            log_persistence(&subject_id, key, StoreKind::Document, &err);
            return Err(AccordError::persistence(
                &subject_id,
                key,
                StoreKind::Document,
                err,
            ));
        }

        if let Err(err) = self.projector.project(&subject_id, key, value).await {
            log_persistence(&subject_id, key, StoreKind::Profile, &err);
            return Err(AccordError::persistence(
                &subject_id,
                key,
                StoreKind::Profile,
                err,
            ));
        }

        self.clear_intent(state).await;
        Ok(())
    }

    async fn write_document_value(
        &self,
        state: &CollectionState,
        field: &FieldDefinition,
        value: &str,
    ) -> StoreResult<()> {
        let mut document = match self.stores.documents.load_document(&state.subject_id).await? {
            Some(document) => document,
            None => self.rebuild_document(state),
        };
        document.set_field(field, value);
        document.refresh_progress(&self.registry);
        self.stores.documents.save_document(&document).await
    }

    async fn reconcile_state(&self, state: &mut CollectionState) -> Result<ReconcileReport> {
        let subject_id = state.subject_id.clone();
        let fields = state
            .pending_write
            .as_ref()
            .map(|pending| pending.fields())
            .unwrap_or_else(|| "*".to_string());

        let existing = self.stores.documents.load_document(&subject_id).await?;
        let document_created = existing.is_none();
        let mut document = match existing {
            Some(document) if self.finalization.is_settled(state, &document) => {
                return self.settle_finalized(state).await;
            }
            Some(document) if document.status != DocumentStatus::CollectingData => {
                return Err(AccordError::transition(
                    document.status.name(),
                    DocumentStatus::CollectingData.name(),
                ));
            }
            Some(mut document) => {
                for (key, value) in &state.collected_data {
                    if let Some(field) = self.registry.get(key) {
                        document.set_field(field, value);
                    }
                }
                document.refresh_progress(&self.registry);
                document
            }
            None => self.rebuild_document(state),
        };

        self.stores
            .documents
            .save_document(&document)
            .await
            .map_err(|err| {
                log_persistence(&subject_id, &fields, StoreKind::Document, &err);
                AccordError::persistence(&subject_id, &fields, StoreKind::Document, err)
            })?;

        let projected_attributes = self
            .projector
            .project_all(&subject_id, &state.collected_data)
            .await
            .map_err(|err| {
                log_persistence(&subject_id, &fields, StoreKind::Profile, &err);
                AccordError::persistence(&subject_id, &fields, StoreKind::Profile, err)
            })?;

        let cleared_intent = state.pending_write.take().is_some();
        state.touch();
        state.version = self.stores.states.save_state(state).await.map_err(|err| {
            log_persistence(&subject_id, &fields, StoreKind::CollectionState, &err);
            AccordError::persistence(&subject_id, &fields, StoreKind::CollectionState, err)
        })?;

        info!(
            subject_id = %subject_id,
            replayed = state.collected_data.len(),
            cleared_intent,
            document_created,
            "reconciled document and profile"
        );
        Ok(ReconcileReport {
            subject_id,
            replayed_fields: state.collected_data.len(),
            projected_attributes,
            cleared_intent,
            document_created,
        })
    }

    /// The contract was written but the collection state survived: project, then drop it.
    async fn settle_finalized(&self, state: &mut CollectionState) -> Result<ReconcileReport> {
        let subject_id = state.subject_id.clone();
        let projected_attributes = self
            .projector
            .project_all(&subject_id, &state.collected_data)
            .await
            .map_err(|err| {
                log_persistence(&subject_id, "*", StoreKind::Profile, &err);
                AccordError::persistence(&subject_id, "*", StoreKind::Profile, err)
            })?;
        self.finalization.discard_state(&subject_id).await?;
        let cleared_intent = state.pending_write.take().is_some();

        info!(subject_id = %subject_id, "leftover collection state removed after finalization");
        Ok(ReconcileReport {
            subject_id,
            replayed_fields: 0,
            projected_attributes,
            cleared_intent,
            document_created: false,
        })
    }

    /// Best effort: an intent left behind only costs a replay on the next turn.
    async fn clear_intent(&self, state: &mut CollectionState) {
        state.clear_intent();
        match self.stores.states.save_state(state).await {
            Ok(version) => state.version = version,
            Err(err) => {
                warn!(subject_id = %state.subject_id, error = %err, "could not clear write intent");
            }
        }
    }

    fn rebuild_document(&self, state: &CollectionState) -> ContractDocument {
        let mut document = ContractDocument::new(&state.subject_id, &self.registry);
        for (key, value) in &state.collected_data {
            if let Some(field) = self.registry.get(key) {
                document.set_field(field, value);
            }
        }
        document.refresh_progress(&self.registry);
        document
    }

    async fn load_collecting(&self, subject_id: &str) -> Result<CollectionState> {
        let state = self
            .stores
            .states
            .load_state(subject_id)
            .await?
            .ok_or_else(|| AccordError::SessionNotFound(subject_id.to_string()))?;
        if state.phase != CollectionPhase::Collecting {
            return Err(AccordError::transition(
                state.phase.name(),
                CollectionPhase::Collecting.name(),
            ));
        }
        Ok(state)
    }

    fn field(&self, key: &str) -> Result<&FieldDefinition> {
        self.registry
            .get(key)
            .ok_or_else(|| AccordError::UnknownField(key.to_string()))
    }

    fn question_for(&self, state: &CollectionState) -> Result<Question> {
        let key = state.next_field().ok_or_else(|| {
            AccordError::InvalidTransition("no question pending for a complete session".to_string())
        })?;
        let field = self.field(key)?;
        Ok(Question::for_field(field, &state.progress(&self.registry)))
    }

    fn status_of(
        &self,
        state: &CollectionState,
        document_status: Option<DocumentStatus>,
    ) -> Result<SessionStatus> {
        let pending_question = match state.next_field() {
            Some(_) => Some(self.question_for(state)?),
            None => None,
        };
        Ok(SessionStatus {
            subject_id: state.subject_id.clone(),
            phase: state.phase,
            progress: state.progress(&self.registry),
            resume_count: state.resume_count,
            pending_question,
            pending_write: state.pending_write.is_some(),
            document_status,
        })
    }
}

fn finalized_start(document: ContractDocument) -> StartOutcome {
    StartOutcome::Finalized {
        signing: SigningAffordance::for_document(&document),
        document: Box::new(document),
    }
}

fn finalized_answer(document: ContractDocument) -> AnswerOutcome {
    AnswerOutcome::Finalized {
        signing: SigningAffordance::for_document(&document),
        document: Box::new(document),
    }
}

fn log_persistence(subject_id: &str, field: &str, store: StoreKind, err: &StoreError) {
    error!(subject_id = %subject_id, field = %field, store = store.name(), error = %err, "persistence failure");
}
