//! Registration-form schema model.
//!
//! A workshop's form is a [`RegistrationFormConfig`]: an optional block of
//! reserved default fields (full name, email, phone) followed by the
//! admin-authored custom fields in display order. This module owns the
//! authoring-time invariants; turning a schema into a submission validator
//! lives in [`validation`](crate::validation).

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::Value;
use crate::validation::derive_rule;

/// Reserved id of the default full-name field.
pub const FULL_NAME_FIELD: &str = "fullName";
/// Reserved id of the default email field.
pub const EMAIL_FIELD: &str = "email";
/// Reserved id of the default phone field.
pub const PHONE_FIELD: &str = "phone";

/// Ids claimed by the default fields while `use_default_fields` is on.
pub const RESERVED_FIELD_IDS: [&str; 3] = [FULL_NAME_FIELD, EMAIL_FIELD, PHONE_FIELD];

/// Input type of a registration-form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Phone,
    Number,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Date,
}

impl FieldType {
    /// All field types, in declaration order.
    pub const ALL: [FieldType; 9] = [
        FieldType::Text,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Number,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::Checkbox,
        FieldType::Radio,
        FieldType::Date,
    ];

    /// Whether a field of this type must carry at least one option.
    #[must_use]
    pub fn requires_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Checkbox | FieldType::Radio)
    }

    /// Wire name of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Date => "date",
        }
    }
}

/// One selectable choice of a select, radio, or checkbox-group field.
///
/// Submissions are compared against `value`; `label` is display-only.
/// Deserialization accepts either a bare string (used as both value and
/// label) or a `{value, label}` object, so every consumer sees one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Option whose label equals its value.
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

impl<'de> Deserialize<'de> for FieldOption {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawOption {
            Plain(String),
            Labeled {
                value: String,
                #[serde(default)]
                label: Option<String>,
            },
        }

        Ok(match RawOption::deserialize(deserializer)? {
            RawOption::Plain(value) => FieldOption::plain(value),
            RawOption::Labeled { value, label } => {
                let label = label
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| value.clone());
                FieldOption { value, label }
            }
        })
    }
}

/// Describes one registration-form input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Stable identifier; key of the answer in submitted form data.
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Non-empty exactly when `field_type.requires_options()`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl FieldDefinition {
    /// Checks the single-field invariants: non-empty id and label, options
    /// present for option-bearing types, and a type-compatible default value.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidField`] describing the first violation.
    pub fn check(&self) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidField {
            field_id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()));
        }
        if self.label.trim().is_empty() {
            return Err(invalid("label must not be empty".to_string()));
        }
        if self.field_type.requires_options() && self.options.is_empty() {
            return Err(invalid(format!(
                "{} fields need at least one option",
                self.field_type.as_str()
            )));
        }
        if let Some(default) = self.default_value.as_ref().filter(|v| !v.is_null()) {
            derive_rule(self)
                .relaxed()
                .check(Some(default))
                .map_err(|msg| invalid(format!("default value: {msg}")))?;
        }
        Ok(())
    }

    /// Drops options from types that do not use them.
    fn normalize(&mut self) {
        if !self.field_type.requires_options() {
            self.options.clear();
        }
        if self.default_value.as_ref().is_some_and(Value::is_null) {
            self.default_value = None;
        }
    }
}

/// Input to [`RegistrationFormConfig::add_field`]. A missing `id` is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl FieldDraft {
    #[must_use]
    pub fn new(field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: None,
            field_type,
            label: label.into(),
            placeholder: None,
            description: None,
            required: false,
            options: Vec::new(),
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = values.into_iter().map(FieldOption::plain).collect();
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    fn into_definition(self, id: String) -> FieldDefinition {
        let mut def = FieldDefinition {
            id,
            field_type: self.field_type,
            label: self.label,
            placeholder: self.placeholder,
            description: self.description,
            required: self.required,
            options: self.options,
            default_value: self.default_value,
        };
        def.normalize();
        def
    }
}

/// Partial update for [`RegistrationFormConfig::update_field`].
///
/// `None` leaves the attribute unchanged. `default_value: Some(Value::Null)`
/// clears the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl FieldPatch {
    /// True when the patch only touches display hints (label, placeholder,
    /// description) and therefore cannot change what submissions are accepted.
    #[must_use]
    pub fn is_cosmetic(&self) -> bool {
        self.field_type.is_none()
            && self.required.is_none()
            && self.options.is_none()
            && self.default_value.is_none()
    }

    fn apply_to(&self, def: &mut FieldDefinition) {
        if let Some(field_type) = self.field_type {
            def.field_type = field_type;
        }
        if let Some(label) = &self.label {
            def.label.clone_from(label);
        }
        if let Some(placeholder) = &self.placeholder {
            def.placeholder = Some(placeholder.clone());
        }
        if let Some(description) = &self.description {
            def.description = Some(description.clone());
        }
        if let Some(required) = self.required {
            def.required = required;
        }
        if let Some(options) = &self.options {
            def.options.clone_from(options);
        }
        if let Some(default) = &self.default_value {
            def.default_value = Some(default.clone());
        }
        def.normalize();
    }
}

/// Errors raised while authoring or checking a form schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SchemaError {
    #[error("invalid field '{field_id}': {reason}")]
    #[serde(rename_all = "camelCase")]
    InvalidField { field_id: String, reason: String },
    #[error("field not found: {id}")]
    NotFound { id: String },
    #[error("field order must list every current field exactly once; offending ids: {ids:?}")]
    UnknownId { ids: Vec<String> },
    #[error("duplicate field id: {id}")]
    DuplicateId { id: String },
}

/// Registration form attached 1:1 to a workshop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFormConfig {
    #[serde(default = "default_use_default_fields")]
    pub use_default_fields: bool,
    /// Display and submission order.
    #[serde(default)]
    pub custom_fields: Vec<FieldDefinition>,
}

fn default_use_default_fields() -> bool {
    true
}

impl Default for RegistrationFormConfig {
    fn default() -> Self {
        Self {
            use_default_fields: true,
            custom_fields: Vec::new(),
        }
    }
}

/// The three reserved default fields, in display order.
#[must_use]
pub fn default_fields() -> Vec<FieldDefinition> {
    let field = |id: &str, field_type, label: &str, required| FieldDefinition {
        id: id.to_string(),
        field_type,
        label: label.to_string(),
        placeholder: None,
        description: None,
        required,
        options: Vec::new(),
        default_value: None,
    };
    vec![
        field(FULL_NAME_FIELD, FieldType::Text, "Full name", true),
        field(EMAIL_FIELD, FieldType::Email, "Email", true),
        field(PHONE_FIELD, FieldType::Phone, "Phone", false),
    ]
}

fn generate_field_id() -> String {
    format!("field_{}", Uuid::new_v4().simple())
}

impl RegistrationFormConfig {
    #[must_use]
    pub fn new(use_default_fields: bool) -> Self {
        Self {
            use_default_fields,
            custom_fields: Vec::new(),
        }
    }

    /// Fields as rendered and validated: the default fields (when enabled)
    /// followed by the custom fields in author order.
    #[must_use]
    pub fn effective_fields(&self) -> Vec<FieldDefinition> {
        let mut fields = if self.use_default_fields {
            default_fields()
        } else {
            Vec::new()
        };
        fields.extend(self.custom_fields.iter().cloned());
        fields
    }

    /// Looks up a custom field by id.
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.custom_fields.iter().find(|f| f.id == id)
    }

    /// Ids of the custom fields, in order.
    #[must_use]
    pub fn field_ids(&self) -> Vec<String> {
        self.custom_fields.iter().map(|f| f.id.clone()).collect()
    }

    fn id_taken(&self, id: &str) -> bool {
        (self.use_default_fields && RESERVED_FIELD_IDS.contains(&id))
            || self.custom_fields.iter().any(|f| f.id == id)
    }

    /// Appends a new custom field.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::DuplicateId`] if the supplied id is already in use
    ///   (including reserved default ids while defaults are enabled).
    /// - [`SchemaError::InvalidField`] if the field violates an invariant.
    pub fn add_field(&mut self, draft: FieldDraft) -> Result<FieldDefinition, SchemaError> {
        let id = match draft.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                if self.id_taken(id) {
                    return Err(SchemaError::DuplicateId { id: id.to_string() });
                }
                id.to_string()
            }
            _ => generate_field_id(),
        };

        let def = draft.into_definition(id);
        def.check()?;
        self.custom_fields.push(def.clone());
        Ok(def)
    }

    /// Applies `patch` to the field with the given id. Switching to a type
    /// without options clears the options. On error the schema is unchanged.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::NotFound`] if no custom field has this id.
    /// - [`SchemaError::InvalidField`] if the patched field is invalid.
    pub fn update_field(
        &mut self,
        id: &str,
        patch: &FieldPatch,
    ) -> Result<FieldDefinition, SchemaError> {
        let slot = self
            .custom_fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| SchemaError::NotFound { id: id.to_string() })?;

        let mut candidate = slot.clone();
        patch.apply_to(&mut candidate);
        candidate.check()?;
        *slot = candidate.clone();
        Ok(candidate)
    }

    /// Removes a custom field. Removing an unknown id is a no-op.
    ///
    /// Returns whether a field was removed.
    pub fn remove_field(&mut self, id: &str) -> bool {
        let before = self.custom_fields.len();
        self.custom_fields.retain(|f| f.id != id);
        self.custom_fields.len() != before
    }

    /// Replaces the custom-field order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownId`] unless `ids` is a permutation of the
    /// current custom-field ids. The offending ids (unknown, repeated, or
    /// missing) are listed in the error.
    pub fn reorder(&mut self, ids: &[String]) -> Result<(), SchemaError> {
        let current: HashSet<&str> = self.custom_fields.iter().map(|f| f.id.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
        let mut offending: Vec<String> = Vec::new();

        for id in ids {
            if !current.contains(id.as_str()) || !seen.insert(id.as_str()) {
                offending.push(id.clone());
            }
        }
        for field in &self.custom_fields {
            if !seen.contains(field.id.as_str()) {
                offending.push(field.id.clone());
            }
        }
        if !offending.is_empty() {
            return Err(SchemaError::UnknownId { ids: offending });
        }

        let mut reordered = Vec::with_capacity(self.custom_fields.len());
        for id in ids {
            if let Some(pos) = self.custom_fields.iter().position(|f| &f.id == id) {
                reordered.push(self.custom_fields.swap_remove(pos));
            }
        }
        self.custom_fields = reordered;
        Ok(())
    }

    /// Turns the reserved default fields on or off.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateId`] when enabling defaults while a
    /// custom field already uses a reserved id.
    pub fn set_use_default_fields(&mut self, enabled: bool) -> Result<(), SchemaError> {
        if enabled {
            if let Some(clash) = self
                .custom_fields
                .iter()
                .find(|f| RESERVED_FIELD_IDS.contains(&f.id.as_str()))
            {
                return Err(SchemaError::DuplicateId {
                    id: clash.id.clone(),
                });
            }
        }
        self.use_default_fields = enabled;
        Ok(())
    }

    /// Aggregate pre-publish check: every field valid, no duplicate ids, no
    /// custom field shadowing an enabled default field.
    ///
    /// # Errors
    ///
    /// Returns every violation found, in field order.
    pub fn validate_schema(&self) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        if self.use_default_fields {
            seen.extend(RESERVED_FIELD_IDS);
        }

        for field in &self.custom_fields {
            if let Err(err) = field.check() {
                errors.push(err);
            }
            if !seen.insert(field.id.as_str()) {
                errors.push(SchemaError::DuplicateId {
                    id: field.id.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn level_draft() -> FieldDraft {
        FieldDraft::new(FieldType::Select, "Level")
            .with_id("level")
            .required()
            .with_options(["Beginner", "Advanced"])
    }

    // ---- add_field ----

    #[test]
    fn add_field_assigns_fresh_id() {
        let mut form = RegistrationFormConfig::default();
        let a = form.add_field(FieldDraft::new(FieldType::Text, "Company")).unwrap();
        let b = form.add_field(FieldDraft::new(FieldType::Text, "Role")).unwrap();

        assert!(a.id.starts_with("field_"));
        assert_ne!(a.id, b.id);
        assert_eq!(form.field_ids(), vec![a.id, b.id]);
    }

    #[test]
    fn add_field_rejects_blank_label() {
        let mut form = RegistrationFormConfig::default();
        let err = form
            .add_field(FieldDraft::new(FieldType::Text, "   "))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));
        assert!(form.custom_fields.is_empty());
    }

    #[test]
    fn add_field_rejects_option_type_without_options() {
        let mut form = RegistrationFormConfig::default();
        for field_type in [FieldType::Select, FieldType::Radio, FieldType::Checkbox] {
            let err = form
                .add_field(FieldDraft::new(field_type, "Pick one"))
                .unwrap_err();
            assert!(matches!(err, SchemaError::InvalidField { .. }), "{field_type:?}");
        }
    }

    #[test]
    fn add_field_drops_options_from_plain_types() {
        let mut form = RegistrationFormConfig::default();
        let def = form
            .add_field(FieldDraft::new(FieldType::Text, "Notes").with_options(["x"]))
            .unwrap();
        assert!(def.options.is_empty());
    }

    #[test]
    fn add_field_rejects_duplicate_and_reserved_ids() {
        let mut form = RegistrationFormConfig::default();
        form.add_field(level_draft()).unwrap();

        let dup = form.add_field(level_draft()).unwrap_err();
        assert_eq!(dup, SchemaError::DuplicateId { id: "level".into() });

        let reserved = form
            .add_field(FieldDraft::new(FieldType::Email, "Work email").with_id("email"))
            .unwrap_err();
        assert_eq!(reserved, SchemaError::DuplicateId { id: "email".into() });
    }

    #[test]
    fn reserved_ids_are_free_when_defaults_disabled() {
        let mut form = RegistrationFormConfig::new(false);
        form.add_field(FieldDraft::new(FieldType::Email, "Email").with_id("email"))
            .unwrap();
        assert_eq!(
            form.set_use_default_fields(true).unwrap_err(),
            SchemaError::DuplicateId { id: "email".into() }
        );
        assert!(!form.use_default_fields);
    }

    #[test]
    fn add_field_checks_default_value_type() {
        let mut form = RegistrationFormConfig::default();
        let err = form
            .add_field(level_draft().with_default(Value::from("Expert")))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { ref reason, .. } if reason.starts_with("default value")));

        let ok = form
            .add_field(level_draft().with_default(Value::from("Beginner")))
            .unwrap();
        assert_eq!(ok.default_value, Some(Value::from("Beginner")));
    }

    // ---- update_field ----

    #[test]
    fn update_field_away_from_options_clears_them() {
        let mut form = RegistrationFormConfig::default();
        form.add_field(level_draft()).unwrap();

        let patch = FieldPatch {
            field_type: Some(FieldType::Text),
            ..FieldPatch::default()
        };
        let updated = form.update_field("level", &patch).unwrap();
        assert_eq!(updated.field_type, FieldType::Text);
        assert!(updated.options.is_empty());
    }

    #[test]
    fn update_field_unknown_id_is_not_found() {
        let mut form = RegistrationFormConfig::default();
        let err = form
            .update_field("ghost", &FieldPatch::default())
            .unwrap_err();
        assert_eq!(err, SchemaError::NotFound { id: "ghost".into() });
    }

    #[test]
    fn failed_update_leaves_field_untouched() {
        let mut form = RegistrationFormConfig::default();
        form.add_field(level_draft()).unwrap();

        let patch = FieldPatch {
            options: Some(Vec::new()),
            label: Some("Skill".into()),
            ..FieldPatch::default()
        };
        assert!(form.update_field("level", &patch).is_err());

        let field = form.field("level").unwrap();
        assert_eq!(field.label, "Level");
        assert_eq!(field.options.len(), 2);
    }

    #[test]
    fn cosmetic_patch_detection() {
        let cosmetic = FieldPatch {
            label: Some("New".into()),
            description: Some("hint".into()),
            ..FieldPatch::default()
        };
        assert!(cosmetic.is_cosmetic());

        let structural = FieldPatch {
            required: Some(false),
            ..FieldPatch::default()
        };
        assert!(!structural.is_cosmetic());
    }

    // ---- remove / reorder ----

    #[test]
    fn remove_field_is_idempotent() {
        let mut form = RegistrationFormConfig::default();
        form.add_field(level_draft()).unwrap();

        assert!(form.remove_field("level"));
        assert!(!form.remove_field("level"));
        assert!(!form.remove_field("never-existed"));
        assert!(form.custom_fields.is_empty());
    }

    #[test]
    fn reorder_applies_permutation() {
        let mut form = RegistrationFormConfig::default();
        for id in ["a", "b", "c"] {
            form.add_field(FieldDraft::new(FieldType::Text, id).with_id(id))
                .unwrap();
        }

        form.reorder(&["c".into(), "a".into(), "b".into()]).unwrap();
        assert_eq!(form.field_ids(), vec!["c", "a", "b"]);
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let mut form = RegistrationFormConfig::default();
        for id in ["a", "b"] {
            form.add_field(FieldDraft::new(FieldType::Text, id).with_id(id))
                .unwrap();
        }

        let unknown = form.reorder(&["a".into(), "z".into()]).unwrap_err();
        assert_eq!(
            unknown,
            SchemaError::UnknownId {
                ids: vec!["z".into(), "b".into()]
            }
        );

        let repeated = form.reorder(&["a".into(), "a".into()]).unwrap_err();
        assert!(matches!(repeated, SchemaError::UnknownId { .. }));

        let short = form.reorder(&["b".into()]).unwrap_err();
        assert_eq!(short, SchemaError::UnknownId { ids: vec!["a".into()] });

        assert_eq!(form.field_ids(), vec!["a", "b"]);
    }

    // ---- validate_schema / effective_fields ----

    #[test]
    fn validate_schema_collects_every_violation() {
        let form = RegistrationFormConfig {
            use_default_fields: true,
            custom_fields: vec![
                FieldDefinition {
                    id: "x".into(),
                    field_type: FieldType::Radio,
                    label: String::new(),
                    placeholder: None,
                    description: None,
                    required: false,
                    options: Vec::new(),
                    default_value: None,
                },
                FieldDefinition {
                    id: "phone".into(),
                    field_type: FieldType::Text,
                    label: "Mobile".into(),
                    placeholder: None,
                    description: None,
                    required: false,
                    options: Vec::new(),
                    default_value: None,
                },
            ],
        };

        let errors = form.validate_schema().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], SchemaError::InvalidField { .. }));
        assert_eq!(errors[1], SchemaError::DuplicateId { id: "phone".into() });
    }

    #[test]
    fn effective_fields_prepend_defaults() {
        let mut form = RegistrationFormConfig::default();
        form.add_field(level_draft()).unwrap();

        let fields = form.effective_fields();
        let ids: Vec<&str> = fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["fullName", "email", "phone", "level"]);
        assert!(fields[0].required);
        assert!(fields[1].required);
        assert!(!fields[2].required);

        form.use_default_fields = false;
        assert_eq!(form.effective_fields().len(), 1);
    }

    #[test]
    fn options_normalize_from_bare_strings() {
        let def: FieldDefinition = serde_json::from_str(
            r#"{"id":"level","type":"select","label":"Level","required":true,
                "options":["Beginner",{"value":"adv","label":"Advanced"},{"value":"x"}]}"#,
        )
        .unwrap();

        assert_eq!(
            def.options,
            vec![
                FieldOption::plain("Beginner"),
                FieldOption::new("adv", "Advanced"),
                FieldOption::plain("x"),
            ]
        );
    }

    #[test]
    fn form_config_wire_format_is_camel_case() {
        let mut form = RegistrationFormConfig::default();
        form.add_field(level_draft()).unwrap();
        let json = serde_json::to_value(&form).unwrap();

        assert_eq!(json["useDefaultFields"], true);
        assert_eq!(json["customFields"][0]["type"], "select");
        assert_eq!(json["customFields"][0]["options"][0]["value"], "Beginner");
    }

    proptest! {
        /// An option-bearing field fails the schema check exactly when it has no options.
        #[test]
        fn option_invariant(
            type_index in 0usize..FieldType::ALL.len(),
            label in "[A-Za-z][A-Za-z ]{0,11}",
            options in proptest::collection::vec("[a-z]{1,6}", 0..4),
        ) {
            let field_type = FieldType::ALL[type_index];
            let form = RegistrationFormConfig {
                use_default_fields: false,
                custom_fields: vec![FieldDefinition {
                    id: "f".into(),
                    field_type,
                    label,
                    placeholder: None,
                    description: None,
                    required: false,
                    options: options.iter().map(FieldOption::plain).collect(),
                    default_value: None,
                }],
            };

            let should_fail = field_type.requires_options() && options.is_empty();
            prop_assert_eq!(form.validate_schema().is_err(), should_fail);
        }
    }
}
