//! Compliance-policy service seam consulted by negotiation.

use crate::error::IntegrationError;
use crate::types::RiskLevel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRequest {
    pub field: String,
    pub proposed_value: String,
    pub jurisdiction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub approved: bool,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// External policy service deciding whether a proposed term change is admissible.
#[async_trait]
pub trait CompliancePolicyService: Send + Sync {
    async fn evaluate(
        &self,
        request: ComplianceRequest,
    ) -> Result<ComplianceVerdict, IntegrationError>;
}
