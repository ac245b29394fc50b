use crate::error::StoreResult;
use crate::types::{CollectionState, ContractDocument, DocumentIdentity, ProfileRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Storage interface for interview progress, one record per subject.
#[async_trait]
pub trait CollectionStateStore: Send + Sync {
    async fn load_state(&self, subject_id: &str) -> StoreResult<Option<CollectionState>>;

    /// Compare-and-swap save.
    ///
    /// `state.version` must equal the persisted version (0 when nothing is persisted); the
    /// stored copy gets the next version, which is returned.
    async fn save_state(&self, state: &CollectionState) -> StoreResult<u64>;

    /// Remove the record; missing records are not an error.
    async fn delete_state(&self, subject_id: &str) -> StoreResult<()>;
}

/// Storage interface for contract documents.
///
/// The stored identity always follows `status`: saving a document that left
/// `collecting_data` writes the contract identity first and then drops the template.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load_document(&self, subject_id: &str) -> StoreResult<Option<ContractDocument>>;
    async fn save_document(&self, document: &ContractDocument) -> StoreResult<()>;
    async fn delete_document(&self, subject_id: &str) -> StoreResult<()>;

    /// Identities currently present for the subject.
    async fn identities(&self, subject_id: &str) -> StoreResult<Vec<DocumentIdentity>>;
}

/// Storage interface for the long-lived employee profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Upsert `attributes` into the subject's profile and return the merged record.
    async fn merge_attributes(
        &self,
        subject_id: &str,
        attributes: BTreeMap<String, String>,
    ) -> StoreResult<ProfileRecord>;

    async fn load_profile(&self, subject_id: &str) -> StoreResult<Option<ProfileRecord>>;
}
