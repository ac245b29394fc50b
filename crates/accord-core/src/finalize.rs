//! Finalization: template to signable contract, and the terminal sign/reject transitions.

use crate::error::{AccordError, Result, StoreError, StoreKind, ValidationError};
use crate::flow::{advance_phase, advance_status};
use crate::schema::FieldRegistry;
use crate::storage::Stores;
use crate::types::{CollectionPhase, CollectionState, ContractDocument, DocumentStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct FinalizationEngine {
    stores: Stores,
    registry: Arc<FieldRegistry>,
}

impl FinalizationEngine {
    pub fn new(stores: Stores, registry: Arc<FieldRegistry>) -> Self {
        Self { stores, registry }
    }

    /// Finalize the subject's interview from its persisted collection state.
    pub async fn finalize(&self, subject_id: &str) -> Result<ContractDocument> {
        let state = self
            .stores
            .states
            .load_state(subject_id)
            .await?
            .ok_or_else(|| AccordError::SessionNotFound(subject_id.to_string()))?;
        self.finalize_state(state).await
    }

    /// Finalize from an in-hand state.
    ///
    /// The document is rebuilt from `collected_data` first, so a document that missed a
    /// write still finalizes with every value. The contract identity is written before the
    /// template disappears, and the collection state is deleted last.
    pub async fn finalize_state(&self, mut state: CollectionState) -> Result<ContractDocument> {
        let subject_id = state.subject_id.clone();
        if !state.is_complete() {
            return Err(AccordError::Incomplete {
                subject_id,
                missing: state.missing_fields.len(),
            });
        }

        let mut document = match self.stores.documents.load_document(&subject_id).await? {
            Some(document) => document,
            None => ContractDocument::new(&subject_id, &self.registry),
        };
        if self.is_settled(&state, &document) {
            warn!(subject_id = %subject_id, status = document.status.name(), "contract already finalized, removing leftover collection state");
            self.discard_state(&subject_id).await?;
            return Ok(document);
        }
        if document.status != DocumentStatus::CollectingData {
            return Err(AccordError::transition(
                document.status.name(),
                DocumentStatus::ReadyForSignature.name(),
            ));
        }

        for (key, value) in &state.collected_data {
            if let Some(field) = self.registry.get(key) {
                document.set_field(field, value);
            }
        }
        document.refresh_progress(&self.registry);
        if !document.progress.missing_fields.is_empty() {
            return Err(AccordError::Incomplete {
                subject_id,
                missing: document.progress.missing_fields.len(),
            });
        }

        advance_phase(&mut state, CollectionPhase::Finalized)?;
        advance_status(&mut document, DocumentStatus::ReadyForSignature)?;
        document.finalized_at = Some(Utc::now());
        document.stamp_hash();

        if let Err(err) = self.stores.documents.save_document(&document).await {
            log_failure(&subject_id, StoreKind::Document, &err);
            return Err(AccordError::persistence(
                &subject_id,
                "*",
                StoreKind::Document,
                err,
            ));
        }
        self.discard_state(&subject_id).await?;

        info!(
            subject_id = %subject_id,
            document_id = %document.document_id,
            collected = document.progress.collected_fields,
            "contract ready for signature"
        );
        Ok(document)
    }

    /// True when `document` is past `collecting_data` and already carries every value of a
    /// complete `state`: a finalization that wrote the contract but kept the state.
    pub fn is_settled(&self, state: &CollectionState, document: &ContractDocument) -> bool {
        document.status != DocumentStatus::CollectingData
            && state.is_complete()
            && state
                .collected_data
                .iter()
                .all(|(key, value)| match self.registry.get(key) {
                    Some(field) => document.value(field) == Some(value.as_str()),
                    None => true,
                })
    }

    /// Delete the collection state of a finalized subject.
    pub async fn discard_state(&self, subject_id: &str) -> Result<()> {
        self.stores
            .states
            .delete_state(subject_id)
            .await
            .map_err(|err| {
                log_failure(subject_id, StoreKind::CollectionState, &err);
                AccordError::persistence(subject_id, "*", StoreKind::CollectionState, err)
            })
    }

    pub async fn sign(&self, subject_id: &str, signer: &str) -> Result<ContractDocument> {
        let signer = signer.trim();
        if signer.is_empty() {
            return Err(ValidationError::new("signer", "a signer is required").into());
        }
        self.close(subject_id, DocumentStatus::Signed, |document| {
            document.closed_by = Some(signer.to_string());
        })
        .await
    }

    pub async fn reject(&self, subject_id: &str, reason: &str) -> Result<ContractDocument> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::new("reason", "a reason is required").into());
        }
        self.close(subject_id, DocumentStatus::Rejected, |document| {
            document.close_reason = Some(reason.to_string());
        })
        .await
    }

    async fn close(
        &self,
        subject_id: &str,
        status: DocumentStatus,
        stamp: impl FnOnce(&mut ContractDocument),
    ) -> Result<ContractDocument> {
        let mut document = self
            .stores
            .documents
            .load_document(subject_id)
            .await?
            .ok_or_else(|| AccordError::SessionNotFound(subject_id.to_string()))?;

        advance_status(&mut document, status)?;
        document.closed_at = Some(Utc::now());
        stamp(&mut document);
        self.stores.documents.save_document(&document).await?;

        info!(subject_id = %subject_id, status = status.name(), "contract closed");
        Ok(document)
    }
}

fn log_failure(subject_id: &str, store: StoreKind, err: &StoreError) {
    error!(subject_id = %subject_id, store = store.name(), error = %err, "finalization write failed");
}
