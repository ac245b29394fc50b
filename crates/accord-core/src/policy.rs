use crate::compliance::{ComplianceRequest, ComplianceVerdict};
use crate::types::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Statutory limits for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionRules {
    /// Hours above this are refused.
    pub max_weekly_hours: f64,
    /// Hours above this are approved with elevated risk.
    pub standard_weekly_hours: f64,
    pub max_remote_days: f64,
    /// Remote days above this are approved with elevated risk.
    pub review_remote_days: f64,
    pub min_notice_days: f64,
    pub max_notice_days: f64,
    /// Gross annual minimum.
    pub salary_floor: f64,
}

impl Default for JurisdictionRules {
    fn default() -> Self {
        Self {
            max_weekly_hours: 48.0,
            standard_weekly_hours: 40.0,
            max_remote_days: 5.0,
            review_remote_days: 3.0,
            min_notice_days: 15.0,
            max_notice_days: 90.0,
            salary_floor: 15_000.0,
        }
    }
}

/// Deterministic policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompliancePolicyConfig {
    pub policy_version: String,
    /// Rules by upper-case jurisdiction code.
    pub jurisdictions: BTreeMap<String, JurisdictionRules>,
    /// Rules applied when the jurisdiction is not listed.
    pub fallback: JurisdictionRules,
}

impl Default for CompliancePolicyConfig {
    fn default() -> Self {
        let mut jurisdictions = BTreeMap::new();
        jurisdictions.insert(
            "ES".to_string(),
            JurisdictionRules {
                max_weekly_hours: 40.0,
                standard_weekly_hours: 37.5,
                // 2024 SMI, 14 payments.
                salary_floor: 15_876.0,
                ..JurisdictionRules::default()
            },
        );
        jurisdictions.insert(
            "US".to_string(),
            JurisdictionRules {
                max_weekly_hours: 60.0,
                min_notice_days: 0.0,
                salary_floor: 15_080.0,
                ..JurisdictionRules::default()
            },
        );
        Self {
            policy_version: "accord-terms-v1".to_string(),
            jurisdictions,
            fallback: JurisdictionRules::default(),
        }
    }
}

/// Rule-based term evaluation.
///
/// Free of side effects: the same request always yields the same verdict.
#[derive(Debug, Clone, Default)]
pub struct RulePolicyEngine {
    config: CompliancePolicyConfig,
}

impl RulePolicyEngine {
    pub fn new(config: CompliancePolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompliancePolicyConfig {
        &self.config
    }

    pub fn rules_for(&self, jurisdiction: &str) -> &JurisdictionRules {
        self.config
            .jurisdictions
            .get(&jurisdiction.to_ascii_uppercase())
            .unwrap_or(&self.config.fallback)
    }

    pub fn evaluate(&self, request: &ComplianceRequest) -> ComplianceVerdict {
        let rules = self.rules_for(&request.jurisdiction);
        let mut block_reasons = BTreeSet::new();
        let mut review_reasons = BTreeSet::new();
        let mut risk = RiskLevel::Low;

        let value = match request.proposed_value.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                return ComplianceVerdict {
                    approved: false,
                    risk_level: RiskLevel::High,
                    reasons: vec![format!(
                        "'{}' is not a numeric value for {}",
                        request.proposed_value, request.field
                    )],
                }
            }
        };

        match request.field.as_str() {
            "weekly_hours" => {
                if value > rules.max_weekly_hours {
                    block_reasons.insert(format!(
                        "weekly hours {} exceed the legal maximum of {}",
                        value, rules.max_weekly_hours
                    ));
                    risk = RiskLevel::High;
                } else if value > rules.standard_weekly_hours {
                    review_reasons.insert(format!(
                        "weekly hours {} exceed the standard {}",
                        value, rules.standard_weekly_hours
                    ));
                    risk = RiskLevel::Medium;
                }
            }
            "remote_days" => {
                if value > rules.max_remote_days {
                    block_reasons.insert(format!(
                        "{} remote days per week exceeds the allowed {}",
                        value, rules.max_remote_days
                    ));
                    risk = RiskLevel::Medium;
                } else if value > rules.review_remote_days {
                    review_reasons.insert(format!(
                        "{} remote days per week requires a telework agreement",
                        value
                    ));
                    risk = RiskLevel::Medium;
                }
            }
            "notice_period_days" => {
                if value < rules.min_notice_days {
                    block_reasons.insert(format!(
                        "notice period of {} days is below the statutory {}",
                        value, rules.min_notice_days
                    ));
                    risk = RiskLevel::High;
                } else if value > rules.max_notice_days {
                    block_reasons.insert(format!(
                        "notice period of {} days exceeds the maximum {}",
                        value, rules.max_notice_days
                    ));
                    risk = RiskLevel::Medium;
                }
            }
            "annual_salary" => {
                if value < rules.salary_floor {
                    block_reasons.insert(format!(
                        "annual salary {} is below the minimum wage floor {}",
                        value, rules.salary_floor
                    ));
                    risk = RiskLevel::High;
                }
            }
            other => {
                block_reasons.insert(format!("no negotiation policy covers '{}'", other));
                risk = RiskLevel::High;
            }
        }

        let approved = block_reasons.is_empty();
        let reasons: Vec<String> = if approved {
            if review_reasons.is_empty() {
                vec![format!("within {} limits", self.config.policy_version)]
            } else {
                review_reasons.into_iter().collect()
            }
        } else {
            block_reasons.into_iter().collect()
        };

        ComplianceVerdict {
            approved,
            risk_level: risk,
            reasons,
        }
    }
}
