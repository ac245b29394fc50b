//! Error types for the contract-completion engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three stores touched by every accepted field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    CollectionState,
    Document,
    Profile,
}

impl StoreKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::CollectionState => "collection_state",
            Self::Document => "document",
            Self::Profile => "profile",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A rejected raw input: which field, and why.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("invalid value for '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic version check failed on save.
    #[error("version conflict for '{subject_id}': expected {expected}, found {found}")]
    Conflict {
        subject_id: String,
        expected: u64,
        found: u64,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the orchestrator, finalization and negotiation engines.
#[derive(Debug, Error)]
pub enum AccordError {
    /// No collection state or document exists for the subject.
    #[error("no active session for subject '{0}'")]
    SessionNotFound(String),

    /// Document is signed or rejected.
    #[error("contract for subject '{subject_id}' is closed ({status})")]
    DocumentClosed { subject_id: String, status: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("correction of '{field}' refused: {reason}")]
    CorrectionNotPermitted { field: String, reason: String },

    #[error("invalid field registry: {0}")]
    InvalidRegistry(String),

    /// Retrieval service did not answer within the configured timeout or failed outright.
    #[error("extraction service unavailable: {0}")]
    ExtractionUnavailable(String),

    /// Compliance service did not answer within the configured timeout or failed outright.
    #[error("compliance service unavailable: {0}")]
    ComplianceUnavailable(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Finalization requested while fields are still pending.
    #[error("cannot finalize '{subject_id}': {missing} field(s) still missing")]
    Incomplete { subject_id: String, missing: usize },

    /// One of the three stores failed during a write.
    #[error("{store} write failed for '{subject_id}' (field {field}): {source}")]
    Persistence {
        subject_id: String,
        field: String,
        store: StoreKind,
        #[source]
        source: StoreError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AccordError {
    pub fn persistence(
        subject_id: &str,
        field: &str,
        store: StoreKind,
        source: StoreError,
    ) -> Self {
        Self::Persistence {
            subject_id: subject_id.to_string(),
            field: field.to_string(),
            store,
            source,
        }
    }

    pub fn transition(from: &str, to: &str) -> Self {
        Self::InvalidTransition(format!("cannot move from '{}' to '{}'", from, to))
    }
}

/// Failure talking to an external collaborator (retrieval or compliance service).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, AccordError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
