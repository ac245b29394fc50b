//! In-memory implementation of the three stores.
//!
//! Deterministic and test-friendly; nothing survives a restart.

use crate::error::{StoreError, StoreResult};
use crate::storage::traits::{CollectionStateStore, DocumentStore, ProfileStore};
use crate::types::{CollectionState, ContractDocument, DocumentIdentity, ProfileRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    states: RwLock<HashMap<String, CollectionState>>,
    documents: RwLock<HashMap<String, ContractDocument>>,
    profiles: RwLock<HashMap<String, ProfileRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(name: &str) -> StoreError {
    StoreError::Backend(format!("{} lock poisoned", name))
}

#[async_trait]
impl CollectionStateStore for InMemoryStore {
    async fn load_state(&self, subject_id: &str) -> StoreResult<Option<CollectionState>> {
        let guard = self.states.read().map_err(|_| poisoned("states"))?;
        Ok(guard.get(subject_id).cloned())
    }

    async fn save_state(&self, state: &CollectionState) -> StoreResult<u64> {
        let mut guard = self.states.write().map_err(|_| poisoned("states"))?;
        let found = guard.get(&state.subject_id).map(|s| s.version).unwrap_or(0);
        if found != state.version {
            return Err(StoreError::Conflict {
                subject_id: state.subject_id.clone(),
                expected: state.version,
                found,
            });
        }

        let mut stored = state.clone();
        stored.version = found + 1;
        guard.insert(stored.subject_id.clone(), stored);
        Ok(found + 1)
    }

    async fn delete_state(&self, subject_id: &str) -> StoreResult<()> {
        let mut guard = self.states.write().map_err(|_| poisoned("states"))?;
        guard.remove(subject_id);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn load_document(&self, subject_id: &str) -> StoreResult<Option<ContractDocument>> {
        let guard = self.documents.read().map_err(|_| poisoned("documents"))?;
        Ok(guard.get(subject_id).cloned())
    }

    async fn save_document(&self, document: &ContractDocument) -> StoreResult<()> {
        let mut guard = self.documents.write().map_err(|_| poisoned("documents"))?;
        guard.insert(document.subject_id.clone(), document.clone());
        Ok(())
    }

    async fn delete_document(&self, subject_id: &str) -> StoreResult<()> {
        let mut guard = self.documents.write().map_err(|_| poisoned("documents"))?;
        guard.remove(subject_id);
        Ok(())
    }

    async fn identities(&self, subject_id: &str) -> StoreResult<Vec<DocumentIdentity>> {
        let guard = self.documents.read().map_err(|_| poisoned("documents"))?;
        Ok(guard
            .get(subject_id)
            .map(|document| vec![document.identity()])
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn merge_attributes(
        &self,
        subject_id: &str,
        attributes: BTreeMap<String, String>,
    ) -> StoreResult<ProfileRecord> {
        let mut guard = self.profiles.write().map_err(|_| poisoned("profiles"))?;
        let record = guard
            .entry(subject_id.to_string())
            .or_insert_with(|| ProfileRecord::new(subject_id));
        record.merge(attributes);
        Ok(record.clone())
    }

    async fn load_profile(&self, subject_id: &str) -> StoreResult<Option<ProfileRecord>> {
        let guard = self.profiles.read().map_err(|_| poisoned("profiles"))?;
        Ok(guard.get(subject_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_version_is_refused() {
        let store = InMemoryStore::new();
        let mut state = CollectionState::new("emp-1");
        state.version = store.save_state(&state).await.unwrap();
        assert_eq!(state.version, 1);

        let stale = state.clone();
        state.version = store.save_state(&state).await.unwrap();
        assert_eq!(state.version, 2);

        match store.save_state(&stale).await {
            Err(StoreError::Conflict {
                expected, found, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn profile_merge_keeps_earlier_attributes() {
        let store = InMemoryStore::new();
        let mut first = BTreeMap::new();
        first.insert("first_name".to_string(), "John".to_string());
        store.merge_attributes("emp-1", first).await.unwrap();

        let mut second = BTreeMap::new();
        second.insert("bank_name".to_string(), "BBVA".to_string());
        let merged = store.merge_attributes("emp-1", second).await.unwrap();
        assert_eq!(merged.attributes.len(), 2);
    }
}
