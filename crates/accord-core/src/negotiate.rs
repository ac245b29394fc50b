//! Post-finalization negotiation of contract terms.

use crate::compliance::{ComplianceRequest, CompliancePolicyService};
use crate::error::{AccordError, Result};
use crate::schema::FieldRegistry;
use crate::storage::Stores;
use crate::types::{DocumentStatus, ModificationOutcome, ModificationRequest};
use crate::validate::normalize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct NegotiationEngine {
    stores: Stores,
    registry: Arc<FieldRegistry>,
    compliance: Arc<dyn CompliancePolicyService>,
    timeout: Duration,
    jurisdiction: String,
}

impl NegotiationEngine {
    pub fn new(
        stores: Stores,
        registry: Arc<FieldRegistry>,
        compliance: Arc<dyn CompliancePolicyService>,
        timeout: Duration,
        jurisdiction: impl Into<String>,
    ) -> Self {
        Self {
            stores,
            registry,
            compliance,
            timeout,
            jurisdiction: jurisdiction.into(),
        }
    }

    /// Ask the compliance service about one change and apply it if approved.
    ///
    /// Every assessed request is appended to the history. A rejected request changes
    /// nothing else; an unreachable service changes nothing at all.
    pub async fn request_modification(
        &self,
        subject_id: &str,
        field: &str,
        requested_value: &str,
    ) -> Result<ModificationOutcome> {
        let mut document = self
            .stores
            .documents
            .load_document(subject_id)
            .await?
            .ok_or_else(|| AccordError::SessionNotFound(subject_id.to_string()))?;

        if document.status.is_closed() {
            return Err(AccordError::DocumentClosed {
                subject_id: subject_id.to_string(),
                status: document.status.name().to_string(),
            });
        }
        if document.status == DocumentStatus::CollectingData {
            info!(subject_id = %subject_id, field = %field, "modification requested before finalization");
            return Ok(ModificationOutcome::NotReady {
                status: document.status,
            });
        }

        let definition = self
            .registry
            .get(field)
            .ok_or_else(|| AccordError::UnknownField(field.to_string()))?;
        let value = normalize(definition, requested_value)?;

        let request = ComplianceRequest {
            field: field.to_string(),
            proposed_value: value.clone(),
            jurisdiction: self.jurisdiction.clone(),
        };
        let verdict =
            match tokio::time::timeout(self.timeout, self.compliance.evaluate(request)).await {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(err)) => {
                    warn!(subject_id = %subject_id, field = %field, error = %err, "compliance service failed");
                    return Err(AccordError::ComplianceUnavailable(err.to_string()));
                }
                Err(_) => {
                    warn!(subject_id = %subject_id, field = %field, "compliance service timed out");
                    return Err(AccordError::ComplianceUnavailable(format!(
                        "no answer within {}ms",
                        self.timeout.as_millis()
                    )));
                }
            };

        let mut modification = ModificationRequest::new(field, value.clone());
        modification.assess(verdict.approved, verdict.risk_level);

        if verdict.approved {
            let previous = document.set_field(definition, &value);
            document.refresh_progress(&self.registry);
            document.stamp_hash();
            document
                .modification_history
                .push(modification.into_record(previous, verdict.reasons.clone()));
            self.stores.documents.save_document(&document).await?;

            info!(
                subject_id = %subject_id,
                field = %field,
                risk = verdict.risk_level.name(),
                "modification approved"
            );
            Ok(ModificationOutcome::Approved {
                document: Box::new(document),
                risk_level: verdict.risk_level,
                reasons: verdict.reasons,
            })
        } else {
            let current = document.value(definition).map(str::to_string);
            document
                .modification_history
                .push(modification.into_record(current, verdict.reasons.clone()));
            self.stores.documents.save_document(&document).await?;

            warn!(
                subject_id = %subject_id,
                field = %field,
                risk = verdict.risk_level.name(),
                reasons = ?verdict.reasons,
                "modification rejected"
            );
            Ok(ModificationOutcome::Rejected {
                risk_level: verdict.risk_level,
                reasons: verdict.reasons,
            })
        }
    }
}
