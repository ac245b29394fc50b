//! Validators and normalizers.
//!
//! Every rule is a pure function of the raw input (and of "today" for date ceilings).
//! A rule either returns the canonical value to store or a [`ValidationError`]; nothing is
//! ever partially applied.

use crate::error::ValidationError;
use crate::schema::{DateFormat, FieldDefinition, ValidatorRule};
use chrono::{NaiveDate, Utc};

/// Characters accepted between digits of a patterned number.
const DIGIT_SEPARATORS: &[char] = &[' ', '-', '.', '/'];

/// Normalize `raw` for `field` against the current UTC date.
pub fn normalize(field: &FieldDefinition, raw: &str) -> Result<String, ValidationError> {
    normalize_on(field, raw, Utc::now().date_naive())
}

/// Normalize `raw` for `field`, treating `today` as the latest admissible date.
pub fn normalize_on(
    field: &FieldDefinition,
    raw: &str,
    today: NaiveDate,
) -> Result<String, ValidationError> {
    let input = raw.trim();
    let key = field.key.as_str();
    if input.is_empty() {
        return Err(ValidationError::new(key, "a value is required"));
    }

    match &field.rule {
        ValidatorRule::TextMinWords { min_words } => text_min_words(key, input, *min_words),
        ValidatorRule::TextMinChars { min_chars } => text_min_chars(key, input, *min_chars),
        ValidatorRule::DigitPattern {
            digits,
            groups,
            separator,
        } => digit_pattern(key, input, *digits, groups, *separator),
        ValidatorRule::DigitRun {
            min_digits,
            max_digits,
        } => digit_run(key, input, *min_digits, *max_digits),
        ValidatorRule::Enumerated {
            values,
            allow_other,
        } => enumerated(key, input, values, *allow_other),
        ValidatorRule::Date {
            formats,
            earliest,
            not_after_today,
        } => {
            let latest = not_after_today.then_some(today);
            date(key, input, formats, *earliest, latest)
        }
        ValidatorRule::NumericRange { min, max } => numeric_range(key, input, *min, *max),
    }
}

fn text_min_words(key: &str, input: &str, min_words: usize) -> Result<String, ValidationError> {
    let words = input.split_whitespace().count();
    if words < min_words {
        return Err(ValidationError::new(
            key,
            format!("expected at least {} words, got {}", min_words, words),
        ));
    }
    Ok(input.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn text_min_chars(key: &str, input: &str, min_chars: usize) -> Result<String, ValidationError> {
    let chars = input.chars().count();
    if chars < min_chars {
        return Err(ValidationError::new(
            key,
            format!("expected at least {} characters, got {}", min_chars, chars),
        ));
    }
    Ok(input.to_string())
}

fn digit_pattern(
    key: &str,
    input: &str,
    digits: usize,
    groups: &[usize],
    separator: char,
) -> Result<String, ValidationError> {
    if let Some(bad) = input
        .chars()
        .find(|c| !c.is_ascii_digit() && !DIGIT_SEPARATORS.contains(c))
    {
        return Err(ValidationError::new(
            key,
            format!("unexpected character '{}'", bad),
        ));
    }

    let found: Vec<char> = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if found.len() != digits {
        return Err(ValidationError::new(
            key,
            format!("expected {} digits, got {}", digits, found.len()),
        ));
    }

    let mut canonical = String::with_capacity(digits + groups.len());
    let mut cursor = 0;
    for (i, width) in groups.iter().enumerate() {
        if i > 0 {
            canonical.push(separator);
        }
        let end = (cursor + width).min(found.len());
        canonical.extend(&found[cursor..end]);
        cursor = end;
    }
    // Digits not covered by the group layout stay attached to the last group.
    canonical.extend(&found[cursor..]);
    Ok(canonical)
}

fn digit_run(
    key: &str,
    input: &str,
    min_digits: usize,
    max_digits: usize,
) -> Result<String, ValidationError> {
    let run: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    let count = run.len();
    if count < min_digits || count > max_digits {
        return Err(ValidationError::new(
            key,
            format!(
                "expected between {} and {} digits, got {}",
                min_digits, max_digits, count
            ),
        ));
    }
    Ok(run)
}

fn enumerated(
    key: &str,
    input: &str,
    values: &[String],
    allow_other: bool,
) -> Result<String, ValidationError> {
    if let Some(known) = values.iter().find(|v| v.eq_ignore_ascii_case(input)) {
        return Ok(known.clone());
    }
    if allow_other {
        return Ok(input.to_string());
    }
    Err(ValidationError::new(
        key,
        format!("expected one of: {}", values.join(", ")),
    ))
}

fn date(
    key: &str,
    input: &str,
    formats: &[DateFormat],
    earliest: NaiveDate,
    latest: Option<NaiveDate>,
) -> Result<String, ValidationError> {
    let parsed = formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format.pattern()).ok())
        .ok_or_else(|| ValidationError::new(key, "not a recognised calendar date"))?;

    if parsed < earliest {
        return Err(ValidationError::new(
            key,
            format!("date must not be before {}", earliest.format("%Y-%m-%d")),
        ));
    }
    if let Some(latest) = latest {
        if parsed > latest {
            return Err(ValidationError::new(key, "date must not be in the future"));
        }
    }
    Ok(parsed.format("%Y-%m-%d").to_string())
}

fn numeric_range(key: &str, input: &str, min: f64, max: f64) -> Result<String, ValidationError> {
    let cleaned: String = input.chars().filter(|c| *c != ',' && *c != '_').collect();
    let value: f64 = cleaned
        .parse()
        .map_err(|_| ValidationError::new(key, "not a number"))?;
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::new(
            key,
            format!("expected a number between {} and {}", min, max),
        ));
    }
    if value.fract() == 0.0 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(format!("{}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldRegistry;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn check(key: &str, raw: &str) -> Result<String, ValidationError> {
        let registry = FieldRegistry::standard();
        normalize_on(registry.get(key).unwrap(), raw, today())
    }

    #[test]
    fn full_name_needs_two_words() {
        let err = check("full_name", "John").unwrap_err();
        assert_eq!(err.field, "full_name");
        assert_eq!(check("full_name", "  John   Doe ").unwrap(), "John Doe");
    }

    #[test]
    fn national_id_is_regrouped() {
        assert_eq!(check("national_id", "123456789012").unwrap(), "1234-5678-9012");
        assert_eq!(
            check("national_id", "123 456.789/012").unwrap(),
            "1234-5678-9012"
        );
        assert_eq!(
            check("national_id", "1234-5678-9012").unwrap(),
            "1234-5678-9012"
        );
    }

    #[test]
    fn national_id_rejects_wrong_length_and_letters() {
        assert!(check("national_id", "12345678901").is_err());
        assert!(check("national_id", "1234567890123").is_err());
        let err = check("national_id", "1234A5678901").unwrap_err();
        assert!(err.reason.contains("unexpected character"));
    }

    #[test]
    fn nationality_matches_case_insensitively_or_keeps_literal() {
        assert_eq!(check("nationality", "spanish").unwrap(), "Spanish");
        assert_eq!(check("nationality", "BRITISH").unwrap(), "British");
        assert_eq!(check("nationality", "Uruguay").unwrap(), "Uruguay");
        assert!(check("nationality", "   ").is_err());
    }

    #[test]
    fn dates_accept_three_layouts() {
        assert_eq!(check("birth_date", "1990-04-07").unwrap(), "1990-04-07");
        assert_eq!(check("birth_date", "7/4/1990").unwrap(), "1990-04-07");
        assert_eq!(check("birth_date", "07-04-1990").unwrap(), "1990-04-07");
    }

    #[test]
    fn dates_reject_impossible_and_out_of_range() {
        assert!(check("birth_date", "31/02/1990").is_err());
        assert!(check("birth_date", "1899-12-31").is_err());
        assert!(check("birth_date", "2026-10-19").is_err());
        assert!(check("birth_date", "2026-10-18").is_ok());
        assert!(check("birth_date", "yesterday").is_err());
    }

    #[test]
    fn start_date_may_be_in_the_future() {
        assert_eq!(check("start_date", "01/11/2027").unwrap(), "2027-11-01");
    }

    #[test]
    fn bank_fields_enforce_minimum_length() {
        assert!(check("bank_name", "BB").is_err());
        assert_eq!(check("bank_name", "BBVA").unwrap(), "BBVA");
        assert!(check("account_holder", "Joe").is_err());
        assert!(check("account_holder", "Jane Doe").is_ok());
    }

    #[test]
    fn account_number_extracts_digit_run() {
        assert_eq!(
            check("account_number", "0049 1500 0512").unwrap(),
            "004915000512"
        );
        assert!(check("account_number", "1234567").is_err());
        assert!(check("account_number", "12345678901234567").is_err());
    }

    #[test]
    fn numeric_terms_are_bounded_and_canonical() {
        assert_eq!(check("weekly_hours", "37.5").unwrap(), "37.5");
        assert_eq!(check("weekly_hours", "40.0").unwrap(), "40");
        assert_eq!(check("annual_salary", "45,000").unwrap(), "45000");
        assert!(check("weekly_hours", "0").is_err());
        assert!(check("remote_days", "eight").is_err());
    }

    proptest! {
        #[test]
        fn national_id_normalization_is_idempotent(digits in "[0-9]{12}", sep in "[ .-]?") {
            let spaced: String = digits
                .chars()
                .enumerate()
                .flat_map(|(i, c)| {
                    let mut chunk = String::new();
                    if i > 0 && i % 3 == 0 {
                        chunk.push_str(&sep);
                    }
                    chunk.push(c);
                    chunk.chars().collect::<Vec<_>>()
                })
                .collect();
            let first = check("national_id", &spaced).unwrap();
            let second = check("national_id", &first).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), 14);
        }

        #[test]
        fn account_number_normalization_is_idempotent(digits in "[0-9]{8,16}") {
            let first = check("account_number", &digits).unwrap();
            let second = check("account_number", &first).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
