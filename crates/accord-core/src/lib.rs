//! Accord core: the autonomous contract-completion engine.
//!
//! A resumable interview collects an employee's missing contract fields, blends them with
//! facts pre-filled by a retrieval service, persists every accepted value to three
//! independent stores, finalizes the document once complete and then allows gated
//! negotiation of contract terms against a compliance-policy service.

#![deny(unsafe_code)]

pub mod compliance;
pub mod config;
pub mod error;
pub mod extraction;
pub mod finalize;
pub mod flow;
pub mod guard;
pub mod negotiate;
pub mod orchestrator;
pub mod policy;
pub mod projection;
pub mod schema;
pub mod storage;
pub mod types;
pub mod validate;

pub use compliance::{ComplianceRequest, ComplianceVerdict, CompliancePolicyService};
pub use config::{CorrectionPolicy, OrchestratorConfig};
pub use error::{AccordError, IntegrationError, StoreError, StoreKind, ValidationError};
pub use extraction::{
    Extraction, ExtractionAdapter, ExtractionRequest, ExtractionResponse, ExtractionService,
};
pub use finalize::FinalizationEngine;
pub use flow::{advance_phase, advance_status};
pub use guard::{SubjectLocks, SubjectTurn};
pub use negotiate::NegotiationEngine;
pub use orchestrator::CollectionOrchestrator;
pub use policy::{CompliancePolicyConfig, JurisdictionRules, RulePolicyEngine};
pub use projection::ProfileProjector;
pub use schema::{
    DateFormat, FieldDefinition, FieldRegistry, FieldSource, Section, ValidatorRule,
};
pub use storage::{
    CollectionStateStore, DocumentStore, FileStore, InMemoryStore, ProfileStore, Stores,
};
pub use types::{
    AnswerOutcome, CollectionPhase, CollectionState, ContractDocument, DocumentIdentity,
    DocumentStatus, ModificationOutcome, ModificationRecord, ModificationRequest, PendingWrite,
    ProfileRecord, Progress, Question, QuestionProgress, ReconcileReport, RiskLevel,
    SessionStatus, SigningAffordance, StartOutcome,
};
pub use validate::{normalize, normalize_on};
