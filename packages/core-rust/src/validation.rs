//! Submission validation derived from a form schema.
//!
//! [`derive_validator`] turns a [`RegistrationFormConfig`] into a
//! [`SubmissionValidator`]: one [`FieldRule`] per effective field, in schema
//! order. Derivation is a pure function of the field list, so two validators
//! derived from the same schema accept and reject exactly the same payloads.
//!
//! # Absent answers
//!
//! `null` always counts as absent. For every rule except free text (text,
//! textarea, phone) an empty or whitespace-only string also counts as absent,
//! because HTML inputs submit `""` for untouched number, date, email, and
//! select controls.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::schema::{FieldDefinition, FieldType, RegistrationFormConfig};
use crate::types::{FormData, Value};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Acceptance rule for one field's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    /// Free text (text, textarea). Required means non-empty after trim.
    Text { required: bool },
    /// `local@domain.tld`.
    Email { required: bool },
    /// Free-form phone number text.
    Phone { required: bool },
    /// Finite number, as JSON number or numeric string.
    Number { required: bool },
    /// Single choice (select, radio), compared by option value.
    Choice { required: bool, allowed: Vec<String> },
    /// Checkbox group. Required means at least one selected value.
    MultiChoice { required: bool, allowed: Vec<String> },
    /// Bare checkbox. Required means it must be checked.
    Consent { required: bool },
    /// Calendar date (`YYYY-MM-DD`) or RFC 3339 date-time.
    Date { required: bool },
}

/// Derives the acceptance rule for a single field definition.
#[must_use]
pub fn derive_rule(field: &FieldDefinition) -> FieldRule {
    let required = field.required;
    let allowed = || field.options.iter().map(|o| o.value.clone()).collect();
    match field.field_type {
        FieldType::Text | FieldType::Textarea => FieldRule::Text { required },
        FieldType::Email => FieldRule::Email { required },
        FieldType::Phone => FieldRule::Phone { required },
        FieldType::Number => FieldRule::Number { required },
        FieldType::Select | FieldType::Radio => FieldRule::Choice {
            required,
            allowed: allowed(),
        },
        // Schemas saved before the option check may still carry a bare checkbox.
        FieldType::Checkbox if field.options.is_empty() => {
            tracing::debug!(field_id = %field.id, "checkbox without options validated as consent");
            FieldRule::Consent { required }
        }
        FieldType::Checkbox => FieldRule::MultiChoice {
            required,
            allowed: allowed(),
        },
        FieldType::Date => FieldRule::Date { required },
    }
}

impl FieldRule {
    #[must_use]
    pub fn is_required(&self) -> bool {
        match self {
            FieldRule::Text { required }
            | FieldRule::Email { required }
            | FieldRule::Phone { required }
            | FieldRule::Number { required }
            | FieldRule::Choice { required, .. }
            | FieldRule::MultiChoice { required, .. }
            | FieldRule::Consent { required }
            | FieldRule::Date { required } => *required,
        }
    }

    /// The same rule with the presence requirement dropped.
    #[must_use]
    pub fn relaxed(mut self) -> Self {
        match &mut self {
            FieldRule::Text { required }
            | FieldRule::Email { required }
            | FieldRule::Phone { required }
            | FieldRule::Number { required }
            | FieldRule::Choice { required, .. }
            | FieldRule::MultiChoice { required, .. }
            | FieldRule::Consent { required }
            | FieldRule::Date { required } => *required = false,
        }
        self
    }

    /// Checks one answer. `None` means the key was not submitted.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the respondent.
    pub fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let value = value.filter(|v| !v.is_null());

        match self {
            FieldRule::Text { required } | FieldRule::Phone { required } => match value {
                None if *required => Err("is required".to_string()),
                None => Ok(()),
                Some(Value::String(s)) if *required && s.trim().is_empty() => {
                    Err("must not be empty".to_string())
                }
                Some(Value::String(_)) => Ok(()),
                Some(other) => Err(format!("expected text, got {}", other.kind())),
            },
            FieldRule::Consent { required } => match value {
                Some(Value::Bool(true)) => Ok(()),
                None | Some(Value::Bool(false)) if *required => {
                    Err("must be checked".to_string())
                }
                None | Some(Value::Bool(false)) => Ok(()),
                Some(other) => Err(format!("expected true or false, got {}", other.kind())),
            },
            _ => {
                let Some(value) = value.filter(|v| !v.is_blank()) else {
                    return if self.is_required() {
                        Err(self.missing_message().to_string())
                    } else {
                        Ok(())
                    };
                };
                self.check_present(value)
            }
        }
    }

    fn missing_message(&self) -> &'static str {
        match self {
            FieldRule::MultiChoice { .. } => "select at least one option",
            _ => "is required",
        }
    }

    fn check_present(&self, value: &Value) -> Result<(), String> {
        match self {
            FieldRule::Email { .. } => match value {
                Value::String(s) if EMAIL_PATTERN.is_match(s.trim()) => Ok(()),
                _ => Err("must be a valid email address".to_string()),
            },
            FieldRule::Number { .. } => {
                let finite = match value {
                    Value::Int(_) => true,
                    Value::Float(f) => f.is_finite(),
                    Value::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
                    _ => false,
                };
                if finite {
                    Ok(())
                } else {
                    Err("must be a number".to_string())
                }
            }
            FieldRule::Choice { allowed, .. } => match value {
                Value::String(s) if allowed.iter().any(|a| a == s) => Ok(()),
                Value::String(s) => Err(format!("'{s}' is not one of the available options")),
                other => Err(format!("expected an option value, got {}", other.kind())),
            },
            FieldRule::MultiChoice { required, allowed } => match value {
                Value::Array(items) if items.is_empty() && *required => {
                    Err("select at least one option".to_string())
                }
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::String(s) if allowed.iter().any(|a| a == s) => {}
                            Value::String(s) => {
                                return Err(format!(
                                    "'{s}' is not one of the available options"
                                ))
                            }
                            other => {
                                return Err(format!(
                                    "expected option values, got {}",
                                    other.kind()
                                ))
                            }
                        }
                    }
                    Ok(())
                }
                other => Err(format!("expected a list of options, got {}", other.kind())),
            },
            FieldRule::Date { .. } => match value {
                Value::String(s) if is_calendar_date(s.trim()) => Ok(()),
                _ => Err("must be a valid date".to_string()),
            },
            // Text, Phone and Consent are fully handled in `check`.
            FieldRule::Text { .. } | FieldRule::Phone { .. } | FieldRule::Consent { .. } => {
                Ok(())
            }
        }
    }
}

fn is_calendar_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

/// One rejected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFailure {
    pub field_id: String,
    pub message: String,
}

/// Result of validating a submission against a derived validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Every known field is satisfied.
    Valid,
    /// One or more fields were rejected; no partial acceptance.
    Invalid {
        /// Failures in schema order.
        errors: Vec<FieldFailure>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Rule bound to the field it checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidator {
    pub field_id: String,
    pub rule: FieldRule,
}

/// Validator for whole submissions, derived from a form schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionValidator {
    fields: Vec<FieldValidator>,
}

/// Derives the submission validator for a form: default-field rules first
/// (when enabled), then one rule per custom field in schema order.
#[must_use]
pub fn derive_validator(config: &RegistrationFormConfig) -> SubmissionValidator {
    let fields = config
        .effective_fields()
        .iter()
        .map(|field| FieldValidator {
            field_id: field.id.clone(),
            rule: derive_rule(field),
        })
        .collect();
    SubmissionValidator { fields }
}

impl SubmissionValidator {
    #[must_use]
    pub fn fields(&self) -> &[FieldValidator] {
        &self.fields
    }

    /// Validates every known field. Keys without a rule are ignored.
    #[must_use]
    pub fn validate(&self, data: &FormData) -> ValidationResult {
        let errors: Vec<FieldFailure> = self
            .fields
            .iter()
            .filter_map(|f| {
                f.rule
                    .check(data.get(&f.field_id))
                    .err()
                    .map(|message| FieldFailure {
                        field_id: f.field_id.clone(),
                        message,
                    })
            })
            .collect();

        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid { errors }
        }
    }

    /// [`validate`](Self::validate) as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the field failures when the submission is rejected.
    pub fn check(&self, data: &FormData) -> Result<(), Vec<FieldFailure>> {
        match self.validate(data) {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { errors } => Err(errors),
        }
    }

    /// Copy of `data` restricted to fields this validator knows about.
    ///
    /// Email answers are stored trimmed, the same form they were matched in.
    #[must_use]
    pub fn known_answers(&self, data: &FormData) -> FormData {
        self.fields
            .iter()
            .filter_map(|f| {
                let value = data.get(&f.field_id)?;
                let stored = match (&f.rule, value) {
                    (FieldRule::Email { .. }, Value::String(s)) => {
                        Value::String(s.trim().to_string())
                    }
                    _ => value.clone(),
                };
                Some((f.field_id.clone(), stored))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::schema::{FieldDraft, FieldOption};

    fn data(pairs: &[(&str, Value)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn field(field_type: FieldType, required: bool, options: &[&str]) -> FieldDefinition {
        FieldDefinition {
            id: "f".into(),
            field_type,
            label: "F".into(),
            placeholder: None,
            description: None,
            required,
            options: options.iter().map(|o| FieldOption::plain(*o)).collect(),
            default_value: None,
        }
    }

    fn check(field_type: FieldType, required: bool, options: &[&str], v: Option<Value>) -> bool {
        derive_rule(&field(field_type, required, options))
            .check(v.as_ref())
            .is_ok()
    }

    // ---- text ----

    #[test]
    fn required_text_rejects_empty_and_whitespace() {
        assert!(!check(FieldType::Text, true, &[], Some(Value::from(""))));
        assert!(!check(FieldType::Text, true, &[], Some(Value::from("  \t"))));
        assert!(!check(FieldType::Textarea, true, &[], None));
        assert!(check(FieldType::Text, true, &[], Some(Value::from("Ada"))));
    }

    #[test]
    fn optional_text_accepts_absence_and_empty() {
        assert!(check(FieldType::Text, false, &[], None));
        assert!(check(FieldType::Text, false, &[], Some(Value::from(""))));
        assert!(check(FieldType::Text, false, &[], Some(Value::Null)));
        assert!(!check(FieldType::Text, false, &[], Some(Value::Int(3))));
    }

    // ---- email ----

    #[test]
    fn email_requires_local_at_domain_with_dot() {
        assert!(check(FieldType::Email, true, &[], Some(Value::from("ada@example.org"))));
        assert!(!check(FieldType::Email, true, &[], Some(Value::from("ada@localhost"))));
        assert!(!check(FieldType::Email, true, &[], Some(Value::from("ada example.org"))));
        assert!(!check(FieldType::Email, true, &[], Some(Value::from("@example.org"))));
        assert!(!check(FieldType::Email, true, &[], None));
        assert!(check(FieldType::Email, false, &[], Some(Value::from(""))));
        assert!(!check(FieldType::Email, false, &[], Some(Value::from("nope"))));
    }

    // ---- number ----

    #[test]
    fn number_accepts_finite_values_only() {
        assert!(check(FieldType::Number, true, &[], Some(Value::Int(3))));
        assert!(check(FieldType::Number, true, &[], Some(Value::Float(2.5))));
        assert!(check(FieldType::Number, true, &[], Some(Value::from(" 42.0 "))));
        assert!(!check(FieldType::Number, true, &[], Some(Value::from("NaN"))));
        assert!(!check(FieldType::Number, true, &[], Some(Value::from("inf"))));
        assert!(!check(FieldType::Number, true, &[], Some(Value::from("twelve"))));
        assert!(!check(FieldType::Number, true, &[], Some(Value::Float(f64::INFINITY))));
        assert!(!check(FieldType::Number, true, &[], None));
        assert!(check(FieldType::Number, false, &[], Some(Value::from(""))));
    }

    // ---- select / radio ----

    #[test]
    fn choice_compares_by_option_value() {
        let def = FieldDefinition {
            options: vec![FieldOption::new("adv", "Advanced")],
            ..field(FieldType::Select, true, &[])
        };
        let rule = derive_rule(&def);
        assert!(rule.check(Some(&Value::from("adv"))).is_ok());
        assert!(rule.check(Some(&Value::from("Advanced"))).is_err());
        assert!(rule.check(None).is_err());

        assert!(check(FieldType::Radio, false, &["a"], None));
        assert!(!check(FieldType::Radio, false, &["a"], Some(Value::from("b"))));
    }

    // ---- checkbox ----

    #[test]
    fn checkbox_group_requires_known_values() {
        let opts = ["rust", "go"];
        assert!(check(
            FieldType::Checkbox,
            true,
            &opts,
            Some(Value::Array(vec![Value::from("rust")]))
        ));
        assert!(!check(FieldType::Checkbox, true, &opts, Some(Value::Array(vec![]))));
        assert!(!check(
            FieldType::Checkbox,
            true,
            &opts,
            Some(Value::Array(vec![Value::from("cobol")]))
        ));
        assert!(!check(FieldType::Checkbox, true, &opts, Some(Value::from("rust"))));
        assert!(check(FieldType::Checkbox, false, &opts, Some(Value::Array(vec![]))));
        assert!(check(FieldType::Checkbox, false, &opts, None));
    }

    #[test]
    fn bare_checkbox_is_consent() {
        assert!(check(FieldType::Checkbox, true, &[], Some(Value::Bool(true))));
        assert!(!check(FieldType::Checkbox, true, &[], Some(Value::Bool(false))));
        assert!(!check(FieldType::Checkbox, true, &[], None));
        assert!(check(FieldType::Checkbox, false, &[], Some(Value::Bool(false))));
        assert!(check(FieldType::Checkbox, false, &[], None));
        assert!(!check(FieldType::Checkbox, false, &[], Some(Value::from("yes"))));
    }

    // ---- date ----

    #[test]
    fn date_must_be_a_real_calendar_date() {
        assert!(check(FieldType::Date, true, &[], Some(Value::from("2024-02-29"))));
        assert!(!check(FieldType::Date, true, &[], Some(Value::from("2023-02-29"))));
        assert!(check(
            FieldType::Date,
            true,
            &[],
            Some(Value::from("2024-05-01T09:30:00+02:00"))
        ));
        assert!(!check(FieldType::Date, true, &[], Some(Value::from("next tuesday"))));
        assert!(check(FieldType::Date, false, &[], None));
    }

    // ---- whole submissions ----

    fn workshop_form() -> RegistrationFormConfig {
        let mut form = RegistrationFormConfig::default();
        form.add_field(
            FieldDraft::new(FieldType::Select, "Level")
                .with_id("level")
                .required()
                .with_options(["Beginner", "Advanced"]),
        )
        .unwrap();
        form
    }

    #[test]
    fn default_fields_are_validated_first() {
        let validator = derive_validator(&workshop_form());
        let ids: Vec<&str> = validator.fields().iter().map(|f| f.field_id.as_str()).collect();
        assert_eq!(ids, vec!["fullName", "email", "phone", "level"]);

        let result = validator.validate(&data(&[("level", Value::from("Expert"))]));
        let ValidationResult::Invalid { errors } = result else {
            panic!("expected failures");
        };
        let failed: Vec<&str> = errors.iter().map(|e| e.field_id.as_str()).collect();
        assert_eq!(failed, vec!["fullName", "email", "level"]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let validator = derive_validator(&workshop_form());
        let submission = data(&[
            ("fullName", Value::from("Ada Lovelace")),
            ("email", Value::from("ada@example.org")),
            ("level", Value::from("Beginner")),
            ("removedLastWeek", Value::from("whatever")),
        ]);

        assert!(validator.validate(&submission).is_valid());

        let kept = validator.known_answers(&submission);
        assert!(!kept.contains_key("removedLastWeek"));
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn stored_email_is_trimmed() {
        let validator = derive_validator(&workshop_form());
        let submission = data(&[
            ("fullName", Value::from("  Ada Lovelace ")),
            ("email", Value::from(" ada@example.org\t")),
            ("level", Value::from("Beginner")),
        ]);
        assert!(validator.validate(&submission).is_valid());

        let kept = validator.known_answers(&submission);
        assert_eq!(kept["email"], Value::from("ada@example.org"));
        // Free text keeps what the respondent typed.
        assert_eq!(kept["fullName"], Value::from("  Ada Lovelace "));
    }

    #[test]
    fn check_returns_failures() {
        let validator = derive_validator(&workshop_form());
        let failures = validator.check(&FormData::new()).unwrap_err();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].message, "is required");
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            "[ab @.0-9-]{0,6}".prop_map(Value::String),
            proptest::collection::vec("[abc]", 0..3)
                .prop_map(|v| Value::Array(v.into_iter().map(Value::String).collect())),
        ]
    }

    proptest! {
        /// Deriving twice from the same schema gives validators that agree on every payload.
        #[test]
        fn derivation_is_deterministic(
            types in proptest::collection::vec((0usize..FieldType::ALL.len(), any::<bool>()), 1..5),
            answers in proptest::collection::vec(proptest::option::of(value_strategy()), 5),
        ) {
            let mut form = RegistrationFormConfig::new(false);
            for (i, (t, required)) in types.iter().enumerate() {
                let mut draft = FieldDraft::new(FieldType::ALL[*t], format!("Field {i}"))
                    .with_id(format!("f{i}"))
                    .with_options(["a", "b"]);
                draft.required = *required;
                form.add_field(draft).unwrap();
            }

            let payload: FormData = answers
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (format!("f{i}"), v)))
                .collect();

            let first = derive_validator(&form);
            let second = derive_validator(&form);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.validate(&payload), second.validate(&payload));
        }
    }
}
