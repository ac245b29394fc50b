//! Retrieval-service seam used to pre-fill employment fields.

use crate::error::{AccordError, IntegrationError, Result};
use crate::schema::FieldRegistry;
use crate::validate::normalize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub subject_id: String,
    pub fields: Vec<String>,
}

/// Field key to value; `None` (or an absent key) means not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub values: BTreeMap<String, Option<String>>,
}

/// External knowledge-retrieval service.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> std::result::Result<ExtractionResponse, IntegrationError>;
}

/// Outcome of a strict extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Every mandatory field came back with a valid value (normalized).
    Complete(BTreeMap<String, String>),
    /// At least one mandatory field is absent or invalid.
    Incomplete { missing: Vec<String> },
}

/// Strict, time-bounded wrapper around an [`ExtractionService`].
#[derive(Clone)]
pub struct ExtractionAdapter {
    service: Arc<dyn ExtractionService>,
    registry: Arc<FieldRegistry>,
    timeout: Duration,
}

impl ExtractionAdapter {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        registry: Arc<FieldRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            registry,
            timeout,
        }
    }

    pub async fn extract(&self, subject_id: &str) -> Result<Extraction> {
        let fields = self.registry.extracted_keys();
        let request = ExtractionRequest {
            subject_id: subject_id.to_string(),
            fields: fields.clone(),
        };

        let response = match tokio::time::timeout(self.timeout, self.service.extract(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(subject_id = %subject_id, error = %err, "extraction service failed");
                return Err(AccordError::ExtractionUnavailable(err.to_string()));
            }
            Err(_) => {
                warn!(subject_id = %subject_id, timeout_ms = self.timeout.as_millis() as u64, "extraction service timed out");
                return Err(AccordError::ExtractionUnavailable(format!(
                    "no answer within {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        let mut values = BTreeMap::new();
        let mut missing = Vec::new();
        for key in fields {
            let raw = response.values.get(&key).cloned().flatten();
            let accepted = match (raw, self.registry.get(&key)) {
                (Some(raw), Some(definition)) => match normalize(definition, &raw) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!(subject_id = %subject_id, field = %key, reason = %err.reason, "extracted value rejected");
                        None
                    }
                },
                _ => None,
            };
            match accepted {
                Some(value) => {
                    values.insert(key, value);
                }
                None => missing.push(key),
            }
        }

        if missing.is_empty() {
            info!(subject_id = %subject_id, fields = values.len(), "extraction complete");
            Ok(Extraction::Complete(values))
        } else {
            warn!(subject_id = %subject_id, missing = ?missing, "extraction incomplete");
            Ok(Extraction::Incomplete { missing })
        }
    }
}
