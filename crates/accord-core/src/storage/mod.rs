//! Persistence for collection state, contract documents and employee profiles.
//!
//! The three stores are independent: there is no cross-store transaction. The orchestrator
//! keeps them convergent with a write-ahead intent on the collection state.

pub mod file;
pub mod memory;
mod traits;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use traits::{CollectionStateStore, DocumentStore, ProfileStore};

use std::path::PathBuf;
use std::sync::Arc;

/// The store handles an orchestrator works against.
#[derive(Clone)]
pub struct Stores {
    pub states: Arc<dyn CollectionStateStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub profiles: Arc<dyn ProfileStore>,
    backend: &'static str,
}

impl Stores {
    pub fn new(
        states: Arc<dyn CollectionStateStore>,
        documents: Arc<dyn DocumentStore>,
        profiles: Arc<dyn ProfileStore>,
        backend: &'static str,
    ) -> Self {
        Self {
            states,
            documents,
            profiles,
            backend,
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(store.clone(), store.clone(), store, "memory")
    }

    pub fn file(root: impl Into<PathBuf>) -> Self {
        let store = Arc::new(FileStore::new(root));
        Self::new(store.clone(), store.clone(), store, "file")
    }

    /// Swap the collection state store, keeping the others.
    pub fn with_states(mut self, states: Arc<dyn CollectionStateStore>) -> Self {
        self.states = states;
        self
    }

    /// Swap the document store, keeping the others.
    pub fn with_documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = documents;
        self
    }

    /// Swap the profile store, keeping the others.
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}
