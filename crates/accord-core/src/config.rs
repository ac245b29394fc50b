use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether values pre-filled by extraction may be overwritten by the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionPolicy {
    /// Extraction is authoritative; corrections go through another channel.
    #[default]
    TrustExtraction,
    AllowUserCorrection,
}

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub extraction_timeout_ms: u64,
    pub compliance_timeout_ms: u64,
    /// Passed to the compliance service with every modification request.
    pub jurisdiction: String,
    pub correction_policy: CorrectionPolicy,
    /// Answers that abandon the interview, compared case-insensitively.
    pub cancel_keywords: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            extraction_timeout_ms: 10_000,
            compliance_timeout_ms: 10_000,
            jurisdiction: "ES".to_string(),
            correction_policy: CorrectionPolicy::TrustExtraction,
            cancel_keywords: ["cancel", "cancelar", "stop", "abort", "quit", "exit"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl OrchestratorConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn compliance_timeout(&self) -> Duration {
        Duration::from_millis(self.compliance_timeout_ms)
    }

    pub fn is_cancellation(&self, raw: &str) -> bool {
        let answer = raw.trim();
        self.cancel_keywords
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(answer))
    }
}
