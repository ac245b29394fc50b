//! Field schema registry.
//!
//! The registry is the static catalogue of everything the engine can collect or negotiate.
//! Declaration order is significant: it is the order in which interview questions are asked.

use crate::error::{AccordError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Document section a field is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Identity,
    Banking,
    Employment,
    Terms,
}

impl Section {
    pub fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Banking => "banking",
            Self::Employment => "employment",
            Self::Terms => "terms",
        }
    }
}

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Pre-filled by the retrieval service before the interview starts.
    Extracted,
    /// Asked during the interview.
    Interview,
    /// Only set through post-finalization negotiation.
    Negotiated,
}

/// Accepted input layouts for date fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    Iso,
    /// `D/M/YYYY`
    DayMonthYearSlash,
    /// `D-M-YYYY`
    DayMonthYearDash,
}

impl DateFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Iso => "%Y-%m-%d",
            Self::DayMonthYearSlash => "%d/%m/%Y",
            Self::DayMonthYearDash => "%d-%m-%Y",
        }
    }

    pub fn all() -> Vec<DateFormat> {
        vec![Self::Iso, Self::DayMonthYearSlash, Self::DayMonthYearDash]
    }
}

/// Validation rule attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatorRule {
    /// At least `min_words` whitespace-separated tokens.
    TextMinWords { min_words: usize },
    /// At least `min_chars` characters after trimming.
    TextMinChars { min_chars: usize },
    /// Exactly `digits` digits, optionally separated; canonical form regroups them.
    DigitPattern {
        digits: usize,
        groups: Vec<usize>,
        separator: char,
    },
    /// Digits extracted from the input must number within `[min_digits, max_digits]`.
    DigitRun { min_digits: usize, max_digits: usize },
    /// Case-insensitive match against `values`; other text accepted when `allow_other`.
    Enumerated { values: Vec<String>, allow_other: bool },
    /// A real calendar date not before `earliest`, optionally not after today.
    Date {
        formats: Vec<DateFormat>,
        earliest: NaiveDate,
        not_after_today: bool,
    },
    /// A decimal number within `[min, max]`.
    NumericRange { min: f64, max: f64 },
}

/// A single collectible or negotiable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    pub label: String,
    pub question: String,
    /// Corrective hint repeated alongside the question after a rejected answer.
    pub hint: String,
    pub section: Section,
    pub source: FieldSource,
    pub rule: ValidatorRule,
    pub required: bool,
    /// Value a fresh document starts with, for negotiated terms.
    pub default_value: Option<String>,
}

impl FieldDefinition {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        section: Section,
        source: FieldSource,
        rule: ValidatorRule,
    ) -> Self {
        let key = key.into();
        let label = label.into();
        Self {
            question: format!("What is your {}?", label.to_lowercase()),
            hint: String::new(),
            key,
            label,
            section,
            source,
            rule,
            required: source != FieldSource::Negotiated,
            default_value: None,
        }
    }

    pub fn asking(mut self, question: impl Into<String>, hint: impl Into<String>) -> Self {
        self.question = question.into();
        self.hint = hint.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Fields that take part in the interview (extracted or asked).
    pub fn is_collectible(&self) -> bool {
        self.source != FieldSource::Negotiated
    }
}

/// Nationalities recognised with canonical casing; anything else is kept as typed.
pub const KNOWN_NATIONALITIES: &[&str] = &[
    "Spanish",
    "Mexican",
    "Argentine",
    "Colombian",
    "Chilean",
    "Peruvian",
    "American",
    "British",
    "French",
    "German",
    "Italian",
    "Portuguese",
];

/// Ordered catalogue of field definitions.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<FieldDefinition>,
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    /// Build a registry, rejecting duplicate keys.
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if index.insert(field.key.clone(), position).is_some() {
                return Err(AccordError::InvalidRegistry(format!(
                    "duplicate field key '{}' in registry",
                    field.key
                )));
            }
        }
        Ok(Self { fields, index })
    }

    /// The standard employment-contract catalogue.
    ///
    /// Three employment fields come from extraction, seven personal and banking fields are
    /// asked in order, and four contract terms are only reachable through negotiation.
    pub fn standard() -> Self {
        let earliest = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
        let fields = vec![
            FieldDefinition::new(
                "position",
                "Position",
                Section::Employment,
                FieldSource::Extracted,
                ValidatorRule::TextMinChars { min_chars: 2 },
            ),
            FieldDefinition::new(
                "department",
                "Department",
                Section::Employment,
                FieldSource::Extracted,
                ValidatorRule::TextMinChars { min_chars: 2 },
            ),
            FieldDefinition::new(
                "start_date",
                "Start date",
                Section::Employment,
                FieldSource::Extracted,
                ValidatorRule::Date {
                    formats: DateFormat::all(),
                    earliest,
                    not_after_today: false,
                },
            ),
            FieldDefinition::new(
                "full_name",
                "Full name",
                Section::Identity,
                FieldSource::Interview,
                ValidatorRule::TextMinWords { min_words: 2 },
            )
            .asking(
                "What is your full legal name?",
                "Please include at least your first name and your last name.",
            ),
            FieldDefinition::new(
                "national_id",
                "National ID",
                Section::Identity,
                FieldSource::Interview,
                ValidatorRule::DigitPattern {
                    digits: 12,
                    groups: vec![4, 4, 4],
                    separator: '-',
                },
            )
            .asking(
                "What is your national identity number?",
                "It must contain exactly 12 digits, for example 1234-5678-9012.",
            ),
            FieldDefinition::new(
                "nationality",
                "Nationality",
                Section::Identity,
                FieldSource::Interview,
                ValidatorRule::Enumerated {
                    values: KNOWN_NATIONALITIES.iter().map(|v| v.to_string()).collect(),
                    allow_other: true,
                },
            )
            .asking(
                "What is your nationality?",
                "Type a nationality such as Spanish, or the name of your country.",
            ),
            FieldDefinition::new(
                "birth_date",
                "Date of birth",
                Section::Identity,
                FieldSource::Interview,
                ValidatorRule::Date {
                    formats: DateFormat::all(),
                    earliest,
                    not_after_today: true,
                },
            )
            .asking(
                "What is your date of birth?",
                "Use YYYY-MM-DD, DD/MM/YYYY or DD-MM-YYYY.",
            ),
            FieldDefinition::new(
                "bank_name",
                "Bank name",
                Section::Banking,
                FieldSource::Interview,
                ValidatorRule::TextMinChars { min_chars: 3 },
            )
            .asking(
                "Which bank should your salary be paid into?",
                "The bank name must have at least 3 characters.",
            ),
            FieldDefinition::new(
                "account_holder",
                "Account holder",
                Section::Banking,
                FieldSource::Interview,
                ValidatorRule::TextMinChars { min_chars: 5 },
            )
            .asking(
                "Who is the holder of that bank account?",
                "The holder name must have at least 5 characters.",
            ),
            FieldDefinition::new(
                "account_number",
                "Account number",
                Section::Banking,
                FieldSource::Interview,
                ValidatorRule::DigitRun {
                    min_digits: 8,
                    max_digits: 16,
                },
            )
            .asking(
                "What is the account number?",
                "The account number must contain between 8 and 16 digits.",
            ),
            FieldDefinition::new(
                "weekly_hours",
                "Weekly hours",
                Section::Terms,
                FieldSource::Negotiated,
                ValidatorRule::NumericRange { min: 1.0, max: 80.0 },
            )
            .with_default("40"),
            FieldDefinition::new(
                "remote_days",
                "Remote days per week",
                Section::Terms,
                FieldSource::Negotiated,
                ValidatorRule::NumericRange { min: 0.0, max: 7.0 },
            )
            .with_default("0"),
            FieldDefinition::new(
                "notice_period_days",
                "Notice period (days)",
                Section::Terms,
                FieldSource::Negotiated,
                ValidatorRule::NumericRange {
                    min: 0.0,
                    max: 365.0,
                },
            )
            .with_default("30"),
            FieldDefinition::new(
                "annual_salary",
                "Annual salary",
                Section::Terms,
                FieldSource::Negotiated,
                ValidatorRule::NumericRange {
                    min: 0.0,
                    max: 100_000_000.0,
                },
            ),
        ];

        // Keys above are unique literals.
        let index = fields
            .iter()
            .enumerate()
            .map(|(position, field)| (field.key.clone(), position))
            .collect();
        Self { fields, index }
    }

    pub fn get(&self, key: &str) -> Option<&FieldDefinition> {
        self.index.get(key).map(|&position| &self.fields[position])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Required fields the retrieval service must supply.
    pub fn extracted_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.source == FieldSource::Extracted && f.required)
            .map(|f| f.key.clone())
            .collect()
    }

    /// Required collectible fields, in declaration order.
    pub fn required_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_collectible() && f.required)
            .map(|f| f.key.clone())
            .collect()
    }

    /// Required keys not present in `collected`, preserving declaration order.
    pub fn missing_keys(&self, collected: &BTreeMap<String, String>) -> Vec<String> {
        self.required_keys()
            .into_iter()
            .filter(|key| !collected.contains_key(key))
            .collect()
    }

    pub fn total_required(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| f.is_collectible() && f.required)
            .count()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalogue_splits_extracted_and_interview_fields() {
        let registry = FieldRegistry::standard();
        assert_eq!(
            registry.extracted_keys(),
            vec!["position", "department", "start_date"]
        );
        assert_eq!(registry.total_required(), 10);
        assert_eq!(registry.required_keys().len(), 10);
        assert!(!registry.get("weekly_hours").unwrap().is_collectible());
    }

    #[test]
    fn missing_keys_follow_declaration_order() {
        let registry = FieldRegistry::standard();
        let mut collected = BTreeMap::new();
        collected.insert("position".to_string(), "Engineer".to_string());
        collected.insert("department".to_string(), "R&D".to_string());
        collected.insert("start_date".to_string(), "2026-11-01".to_string());
        collected.insert("nationality".to_string(), "Spanish".to_string());

        let missing = registry.missing_keys(&collected);
        assert_eq!(
            missing,
            vec![
                "full_name",
                "national_id",
                "birth_date",
                "bank_name",
                "account_holder",
                "account_number"
            ]
        );
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let field = FieldDefinition::new(
            "x",
            "X",
            Section::Identity,
            FieldSource::Interview,
            ValidatorRule::TextMinChars { min_chars: 1 },
        );
        let result = FieldRegistry::new(vec![field.clone(), field]);
        assert!(result.is_err());
    }
}
