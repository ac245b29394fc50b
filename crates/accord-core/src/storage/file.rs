//! File-backed JSON stores.
//!
//! Layout under the root directory:
//!
//! ```text
//! sessions/<subject>.json
//! documents/template-<subject>.json | documents/contract-<subject>.json
//! profiles/<subject>.json
//! ```
//!
//! Every write goes to a sibling `.tmp` file and is renamed into place, so readers never
//! observe a half-written record.

use crate::error::{StoreError, StoreResult};
use crate::storage::traits::{CollectionStateStore, DocumentStore, ProfileStore};
use crate::types::{CollectionState, ContractDocument, DocumentIdentity, ProfileRecord};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serialises read-compare-write of collection states within this process.
    state_lock: Mutex<()>,
    profile_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state_lock: Mutex::new(()),
            profile_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_path(&self, subject_id: &str) -> StoreResult<PathBuf> {
        Ok(self
            .root
            .join("sessions")
            .join(format!("{}.json", checked_subject(subject_id)?)))
    }

    /// Path of one export identity of the subject's document.
    pub fn document_path(
        &self,
        subject_id: &str,
        identity: DocumentIdentity,
    ) -> StoreResult<PathBuf> {
        Ok(self.root.join("documents").join(format!(
            "{}-{}.json",
            identity.prefix(),
            checked_subject(subject_id)?
        )))
    }

    fn profile_path(&self, subject_id: &str) -> StoreResult<PathBuf> {
        Ok(self
            .root
            .join("profiles")
            .join(format!("{}.json", checked_subject(subject_id)?)))
    }
}

/// Subject ids become file names, so only a conservative alphabet is accepted.
fn checked_subject(subject_id: &str) -> StoreResult<&str> {
    let valid = !subject_id.is_empty()
        && subject_id.len() <= 128
        && !subject_id.starts_with('.')
        && subject_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(subject_id)
    } else {
        Err(StoreError::Backend(format!(
            "subject id '{}' is not usable as a file name",
            subject_id
        )))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).await?;
    fs::rename(tmp_path, path).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl CollectionStateStore for FileStore {
    async fn load_state(&self, subject_id: &str) -> StoreResult<Option<CollectionState>> {
        read_json(&self.state_path(subject_id)?).await
    }

    async fn save_state(&self, state: &CollectionState) -> StoreResult<u64> {
        let path = self.state_path(&state.subject_id)?;
        let _guard = self.state_lock.lock().await;

        let found = read_json::<CollectionState>(&path)
            .await?
            .map(|s| s.version)
            .unwrap_or(0);
        if found != state.version {
            return Err(StoreError::Conflict {
                subject_id: state.subject_id.clone(),
                expected: state.version,
                found,
            });
        }

        let mut stored = state.clone();
        stored.version = found + 1;
        write_json(&path, &stored).await?;
        Ok(stored.version)
    }

    async fn delete_state(&self, subject_id: &str) -> StoreResult<()> {
        let path = self.state_path(subject_id)?;
        let _guard = self.state_lock.lock().await;
        remove_if_present(&path).await
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load_document(&self, subject_id: &str) -> StoreResult<Option<ContractDocument>> {
        let contract = self.document_path(subject_id, DocumentIdentity::Contract)?;
        let template = self.document_path(subject_id, DocumentIdentity::Template)?;

        if let Some(document) = read_json::<ContractDocument>(&contract).await? {
            // A crash between the two halves of finalization leaves a stale template behind.
            if fs::try_exists(&template).await? {
                warn!(subject_id = %subject_id, "removing stale template shadowed by contract");
                remove_if_present(&template).await?;
            }
            return Ok(Some(document));
        }
        read_json(&template).await
    }

    async fn save_document(&self, document: &ContractDocument) -> StoreResult<()> {
        let identity = document.identity();
        let path = self.document_path(&document.subject_id, identity)?;
        write_json(&path, document).await?;

        if identity == DocumentIdentity::Contract {
            let template = self.document_path(&document.subject_id, DocumentIdentity::Template)?;
            remove_if_present(&template).await?;
        }
        Ok(())
    }

    async fn delete_document(&self, subject_id: &str) -> StoreResult<()> {
        remove_if_present(&self.document_path(subject_id, DocumentIdentity::Template)?).await?;
        remove_if_present(&self.document_path(subject_id, DocumentIdentity::Contract)?).await
    }

    async fn identities(&self, subject_id: &str) -> StoreResult<Vec<DocumentIdentity>> {
        let mut present = Vec::new();
        for identity in [DocumentIdentity::Template, DocumentIdentity::Contract] {
            if fs::try_exists(self.document_path(subject_id, identity)?).await? {
                present.push(identity);
            }
        }
        Ok(present)
    }
}

#[async_trait]
impl ProfileStore for FileStore {
    async fn merge_attributes(
        &self,
        subject_id: &str,
        attributes: BTreeMap<String, String>,
    ) -> StoreResult<ProfileRecord> {
        let path = self.profile_path(subject_id)?;
        let _guard = self.profile_lock.lock().await;

        let mut record = read_json::<ProfileRecord>(&path)
            .await?
            .unwrap_or_else(|| ProfileRecord::new(subject_id));
        record.merge(attributes);
        write_json(&path, &record).await?;
        Ok(record)
    }

    async fn load_profile(&self, subject_id: &str) -> StoreResult<Option<ProfileRecord>> {
        read_json(&self.profile_path(subject_id)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::advance_status;
    use crate::schema::FieldRegistry;
    use crate::types::DocumentStatus;
    use uuid::Uuid;

    fn temp_store() -> FileStore {
        FileStore::new(std::env::temp_dir().join(format!("accord-store-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn state_persists_across_reload() {
        let store = temp_store();
        let mut state = CollectionState::new("emp-1");
        state.version = store.save_state(&state).await.unwrap();

        let reopened = FileStore::new(store.root().to_path_buf());
        let loaded = reopened.load_state("emp-1").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, state.session_id);
        assert_eq!(loaded.version, 1);

        let mut stale = loaded.clone();
        stale.version = 0;
        assert!(matches!(
            reopened.save_state(&stale).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn finalized_document_swaps_identity() {
        let store = temp_store();
        let registry = FieldRegistry::standard();
        let mut document = ContractDocument::new("emp-2", &registry);
        store.save_document(&document).await.unwrap();
        assert_eq!(
            store.identities("emp-2").await.unwrap(),
            vec![DocumentIdentity::Template]
        );

        advance_status(&mut document, DocumentStatus::ReadyForSignature).unwrap();
        store.save_document(&document).await.unwrap();
        assert_eq!(
            store.identities("emp-2").await.unwrap(),
            vec![DocumentIdentity::Contract]
        );
    }

    #[tokio::test]
    async fn contract_wins_over_stale_template() {
        let store = temp_store();
        let registry = FieldRegistry::standard();
        let template = ContractDocument::new("emp-3", &registry);
        let mut contract = template.clone();
        advance_status(&mut contract, DocumentStatus::ReadyForSignature).unwrap();

        // Simulate a crash after the contract write but before the template removal.
        write_json(
            &store
                .document_path("emp-3", DocumentIdentity::Contract)
                .unwrap(),
            &contract,
        )
        .await
        .unwrap();
        store.save_document(&template).await.unwrap();

        let loaded = store.load_document("emp-3").await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::ReadyForSignature);
        assert_eq!(
            store.identities("emp-3").await.unwrap(),
            vec![DocumentIdentity::Contract]
        );
    }

    #[tokio::test]
    async fn rejects_path_like_subjects() {
        let store = temp_store();
        assert!(store.load_state("../etc").await.is_err());
        assert!(store.load_state("").await.is_err());
    }
}
