//! In-process stand-ins for the external services, used for local runs and demos.

use crate::error::{AdapterError, AdapterResult};
use accord_core::{
    ComplianceRequest, ComplianceVerdict, CompliancePolicyConfig, CompliancePolicyService,
    ExtractionRequest, ExtractionResponse, ExtractionService, IntegrationError, RulePolicyEngine,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Employment records keyed by subject id, as stored in a fixture file.
///
/// ```json
/// { "subjects": { "emp-1": { "position": "Engineer", "department": null } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFixtures {
    #[serde(default)]
    pub subjects: BTreeMap<String, BTreeMap<String, Option<String>>>,
}

/// Retrieval service answering from a fixed set of records.
#[derive(Debug, Clone, Default)]
pub struct StaticExtractionService {
    fixtures: ExtractionFixtures,
}

impl StaticExtractionService {
    pub fn new(fixtures: ExtractionFixtures) -> Self {
        Self { fixtures }
    }

    pub fn from_json(raw: &str) -> AdapterResult<Self> {
        let fixtures =
            serde_json::from_str(raw).map_err(|e| AdapterError::Fixture(e.to_string()))?;
        Ok(Self::new(fixtures))
    }

    pub fn load(path: &Path) -> AdapterResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AdapterError::Fixture(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn with_subject<K, V>(
        mut self,
        subject_id: &str,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let record = values
            .into_iter()
            .map(|(k, v)| (k.into(), Some(v.into())))
            .collect();
        self.fixtures.subjects.insert(subject_id.to_string(), record);
        self
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.fixtures.subjects.keys().map(String::as_str)
    }
}

#[async_trait]
impl ExtractionService for StaticExtractionService {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResponse, IntegrationError> {
        let record = self.fixtures.subjects.get(&request.subject_id);
        debug!(subject_id = %request.subject_id, known = record.is_some(), "fixture lookup");

        let values = request
            .fields
            .iter()
            .map(|field| {
                let value = record.and_then(|r| r.get(field)).cloned().flatten();
                (field.clone(), value)
            })
            .collect();
        Ok(ExtractionResponse { values })
    }
}

/// Compliance service backed by the built-in rule engine.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedComplianceService {
    engine: RulePolicyEngine,
}

impl RuleBasedComplianceService {
    pub fn new(config: CompliancePolicyConfig) -> Self {
        Self {
            engine: RulePolicyEngine::new(config),
        }
    }

    pub fn engine(&self) -> &RulePolicyEngine {
        &self.engine
    }
}

#[async_trait]
impl CompliancePolicyService for RuleBasedComplianceService {
    async fn evaluate(
        &self,
        request: ComplianceRequest,
    ) -> Result<ComplianceVerdict, IntegrationError> {
        Ok(self.engine.evaluate(&request))
    }
}
