use crate::error::ValidationError;
use crate::schema::{FieldDefinition, FieldRegistry, Section};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Interview phase of a collection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPhase {
    Uninitialized,
    Extracting,
    Collecting,
    Finalized,
    Cancelled,
}

impl CollectionPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Extracting => "extracting",
            Self::Collecting => "collecting",
            Self::Finalized => "finalized",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }
}

/// Write-ahead marker: these values reached the collection state but the document and
/// profile projections may not have caught up yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub values: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl PendingWrite {
    pub fn fields(&self) -> String {
        self.values.keys().cloned().collect::<Vec<_>>().join(",")
    }
}

/// Persisted interview progress for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionState {
    pub session_id: String,
    pub subject_id: String,
    pub phase: CollectionPhase,
    pub collected_data: BTreeMap<String, String>,
    /// Pending keys; the head is the next question.
    pub missing_fields: Vec<String>,
    pub extracted_fields: BTreeSet<String>,
    pub resume_count: u32,
    /// Set by a resumption, cleared by the next accepted value.
    #[serde(default)]
    pub resumed_since_answer: bool,
    /// Optimistic concurrency counter, bumped by the store on every save.
    pub version: u64,
    #[serde(default)]
    pub pending_write: Option<PendingWrite>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl CollectionState {
    /// A fresh, never-persisted state for `subject_id`.
    pub fn new(subject_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            phase: CollectionPhase::Uninitialized,
            collected_data: BTreeMap::new(),
            missing_fields: Vec::new(),
            extracted_fields: BTreeSet::new(),
            resume_count: 0,
            resumed_since_answer: false,
            version: 0,
            pending_write: None,
            started_at: now,
            last_updated_at: now,
        }
    }

    /// Seed with extracted values and compute the pending keys in registry order.
    pub fn seed(&mut self, extracted: BTreeMap<String, String>, registry: &FieldRegistry) {
        self.extracted_fields = extracted.keys().cloned().collect();
        self.collected_data = extracted;
        self.missing_fields = registry.missing_keys(&self.collected_data);
        self.touch();
    }

    pub fn next_field(&self) -> Option<&str> {
        self.missing_fields.first().map(String::as_str)
    }

    /// Store an accepted value, drop it from the pending list and leave a write-ahead intent.
    pub fn record(&mut self, field: &str, value: &str) {
        self.collected_data
            .insert(field.to_string(), value.to_string());
        self.missing_fields.retain(|key| key != field);
        self.resumed_since_answer = false;
        let mut values = BTreeMap::new();
        values.insert(field.to_string(), value.to_string());
        self.mark_pending(values);
    }

    /// Leave a write-ahead intent covering `values`.
    pub fn mark_pending(&mut self, values: BTreeMap<String, String>) {
        self.pending_write = Some(PendingWrite {
            values,
            recorded_at: Utc::now(),
        });
        self.touch();
    }

    pub fn clear_intent(&mut self) {
        self.pending_write = None;
        self.touch();
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }

    pub fn progress(&self, registry: &FieldRegistry) -> Progress {
        Progress {
            total_fields: registry.total_required(),
            collected_fields: registry.total_required() - self.missing_fields.len(),
            missing_fields: self.missing_fields.clone(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }
}

/// Lifecycle status of a contract document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    CollectingData,
    ReadyForSignature,
    Signed,
    Rejected,
}

impl DocumentStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::CollectingData => "collecting_data",
            Self::ReadyForSignature => "ready_for_signature",
            Self::Signed => "signed",
            Self::Rejected => "rejected",
        }
    }

    /// Signed and rejected documents accept no further change.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Signed | Self::Rejected)
    }

    pub fn identity(self) -> DocumentIdentity {
        match self {
            Self::CollectingData => DocumentIdentity::Template,
            _ => DocumentIdentity::Contract,
        }
    }
}

/// Export identity of a document, derived from its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentIdentity {
    Template,
    Contract,
}

impl DocumentIdentity {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Contract => "contract",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub total_fields: usize,
    pub collected_fields: usize,
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One negotiation attempt, approved or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationRecord {
    pub timestamp: DateTime<Utc>,
    pub field: String,
    pub requested_change: String,
    pub previous_value: Option<String>,
    pub approved: bool,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
}

/// A modification in flight; becomes a [`ModificationRecord`] once assessed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationRequest {
    pub field: String,
    pub requested_value: String,
    pub risk_assessment: Option<RiskLevel>,
    pub approved: Option<bool>,
}

impl ModificationRequest {
    pub fn new(field: impl Into<String>, requested_value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            requested_value: requested_value.into(),
            risk_assessment: None,
            approved: None,
        }
    }

    pub fn assess(&mut self, approved: bool, risk_level: RiskLevel) {
        self.approved = Some(approved);
        self.risk_assessment = Some(risk_level);
    }

    pub fn into_record(
        self,
        previous_value: Option<String>,
        reasons: Vec<String>,
    ) -> ModificationRecord {
        ModificationRecord {
            timestamp: Utc::now(),
            field: self.field,
            requested_change: self.requested_value,
            previous_value,
            approved: self.approved.unwrap_or(false),
            risk_level: self.risk_assessment.unwrap_or(RiskLevel::High),
            reasons,
        }
    }
}

/// The employment contract being assembled, then signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDocument {
    pub document_id: String,
    pub subject_id: String,
    pub status: DocumentStatus,
    pub sections: BTreeMap<Section, BTreeMap<String, String>>,
    pub progress: Progress,
    pub modification_history: Vec<ModificationRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_by: Option<String>,
    #[serde(default)]
    pub close_reason: Option<String>,
}

impl ContractDocument {
    /// Empty template with negotiated terms at their registry defaults.
    pub fn new(subject_id: impl Into<String>, registry: &FieldRegistry) -> Self {
        let now = Utc::now();
        let mut sections: BTreeMap<Section, BTreeMap<String, String>> = BTreeMap::new();
        for field in registry.fields() {
            if let Some(default) = &field.default_value {
                sections
                    .entry(field.section)
                    .or_default()
                    .insert(field.key.clone(), default.clone());
            }
        }

        let mut document = Self {
            document_id: Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            status: DocumentStatus::CollectingData,
            sections,
            progress: Progress::default(),
            modification_history: Vec::new(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
            content_hash: None,
            closed_at: None,
            closed_by: None,
            close_reason: None,
        };
        document.refresh_progress(registry);
        document
    }

    /// Write `value` under the field's section, returning the value it replaced.
    pub fn set_field(&mut self, field: &FieldDefinition, value: &str) -> Option<String> {
        self.updated_at = Utc::now();
        self.sections
            .entry(field.section)
            .or_default()
            .insert(field.key.clone(), value.to_string())
    }

    pub fn value(&self, field: &FieldDefinition) -> Option<&str> {
        self.sections
            .get(&field.section)
            .and_then(|section| section.get(&field.key))
            .map(String::as_str)
    }

    /// Recompute progress from the section contents.
    pub fn refresh_progress(&mut self, registry: &FieldRegistry) {
        let missing: Vec<String> = registry
            .fields()
            .iter()
            .filter(|f| f.is_collectible() && f.required && self.value(f).is_none())
            .map(|f| f.key.clone())
            .collect();
        let total = registry.total_required();
        self.progress = Progress {
            total_fields: total,
            collected_fields: total - missing.len(),
            missing_fields: missing,
        };
    }

    /// blake3 over section names, keys and values in their canonical (sorted) order.
    pub fn compute_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (section, fields) in &self.sections {
            hasher.update(section.name().as_bytes());
            hasher.update(&[0x1e]);
            for (key, value) in fields {
                hasher.update(key.as_bytes());
                hasher.update(&[0x1f]);
                hasher.update(value.as_bytes());
                hasher.update(&[0x1f]);
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn stamp_hash(&mut self) {
        self.content_hash = Some(self.compute_hash());
    }

    pub fn identity(&self) -> DocumentIdentity {
        self.status.identity()
    }
}

/// Progress shown next to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionProgress {
    pub collected: usize,
    pub total: usize,
}

/// The next thing the interview asks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub field: String,
    pub label: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub progress: QuestionProgress,
}

impl Question {
    pub fn for_field(field: &FieldDefinition, progress: &Progress) -> Self {
        Self {
            field: field.key.clone(),
            label: field.label.clone(),
            prompt: field.question.clone(),
            hint: None,
            progress: QuestionProgress {
                collected: progress.collected_fields,
                total: progress.total_fields,
            },
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        if !hint.is_empty() {
            self.hint = Some(hint.to_string());
        }
        self
    }
}

/// What a finalized document can do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningAffordance {
    pub document_id: String,
    pub content_hash: Option<String>,
    pub actions: Vec<String>,
}

impl SigningAffordance {
    pub fn for_document(document: &ContractDocument) -> Self {
        Self {
            document_id: document.document_id.clone(),
            content_hash: document.content_hash.clone(),
            actions: vec![
                "sign".to_string(),
                "reject".to_string(),
                "request_modification".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Question {
        question: Question,
    },
    ResumedQuestion {
        question: Question,
        resume_count: u32,
    },
    ExtractionFailure {
        missing_fields: Vec<String>,
        message: String,
    },
    Finalized {
        document: Box<ContractDocument>,
        signing: SigningAffordance,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    NextQuestion {
        question: Question,
    },
    ValidationError {
        error: ValidationError,
        question: Question,
    },
    Finalized {
        document: Box<ContractDocument>,
        signing: SigningAffordance,
    },
    Cancelled {
        subject_id: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModificationOutcome {
    Approved {
        document: Box<ContractDocument>,
        risk_level: RiskLevel,
        reasons: Vec<String>,
    },
    Rejected {
        risk_level: RiskLevel,
        reasons: Vec<String>,
    },
    NotReady {
        status: DocumentStatus,
    },
}

/// Read-only snapshot of where a subject stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub subject_id: String,
    pub phase: CollectionPhase,
    pub progress: Progress,
    pub resume_count: u32,
    pub pending_question: Option<Question>,
    pub pending_write: bool,
    pub document_status: Option<DocumentStatus>,
}

/// Long-lived employee attributes projected from accepted answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub subject_id: String,
    pub attributes: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            attributes: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Later values win; attributes absent from `attributes` are kept.
    pub fn merge(&mut self, attributes: BTreeMap<String, String>) {
        self.attributes.extend(attributes);
        self.updated_at = Utc::now();
    }
}

/// Result of replaying collected values into the document and profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub subject_id: String,
    pub replayed_fields: usize,
    pub projected_attributes: usize,
    pub cleared_intent: bool,
    pub document_created: bool,
}
