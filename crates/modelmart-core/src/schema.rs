//! Input schemas and request validation.
//!
//! A model declares an ordered list of [`FieldSpec`]s. [`validate`] checks a
//! JSON payload against that list and collects every violation instead of
//! stopping at the first one, so the caller can decide how to reject.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of an input field.
///
/// Tags outside the recognized set are kept as [`FieldType::Unknown`] and
/// accept any present value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// A finite JSON number.
    Numeric,
    /// A non-empty string drawn from a category set.
    Categorical,
    /// A non-empty free-text string.
    Text,
    /// A JSON array.
    Array,
    /// Any other tag; accepts every present value.
    Unknown(String),
}

impl FieldType {
    /// Get the type tag as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Text => "text",
            Self::Array => "array",
            Self::Unknown(tag) => tag,
        }
    }

    /// Check a present, non-null value against this type.
    fn check(&self, value: &Value) -> Result<(), Violation> {
        match self {
            Self::Numeric => match value.as_f64() {
                Some(n) if n.is_finite() => Ok(()),
                _ => Err(Violation::TypeMismatch),
            },
            Self::Categorical | Self::Text => match value.as_str() {
                Some(s) if s.trim().is_empty() => Err(Violation::EmptyString),
                Some(_) => Ok(()),
                None => Err(Violation::TypeMismatch),
            },
            Self::Array => {
                if value.is_array() {
                    Ok(())
                } else {
                    Err(Violation::TypeMismatch)
                }
            }
            Self::Unknown(_) => Ok(()),
        }
    }
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "numeric" => Self::Numeric,
            "categorical" => Self::Categorical,
            "text" => Self::Text,
            "array" => Self::Array,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named field of a model's input schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as it must appear in the payload.
    pub name: String,

    /// Declared type.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether the field must be present. Defaults to `true`.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Element type constraint for `array` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<FieldType>,
}

const fn default_required() -> bool {
    true
}

impl FieldSpec {
    /// A required field.
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            items: None,
        }
    }

    /// An optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Constrain the element type of an array field.
    #[must_use]
    pub fn with_items(mut self, items: FieldType) -> Self {
        self.items = Some(items);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Violation {
    TypeMismatch,
    EmptyString,
}

/// A single field-scoped validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    /// The payload is not a JSON object.
    NotAnObject,

    /// A required field is absent or null.
    MissingField {
        /// Field name.
        field: String,
    },

    /// A field value does not match its declared type.
    TypeMismatch {
        /// Field name.
        field: String,
        /// The declared type tag.
        expected: String,
    },

    /// A string field is empty after trimming whitespace.
    EmptyString {
        /// Field name.
        field: String,
    },

    /// An array element does not match the declared element type.
    ElementMismatch {
        /// Field name.
        field: String,
        /// Position of the offending element.
        index: usize,
        /// The declared element type tag.
        expected: String,
    },
}

impl FieldError {
    /// The field the error refers to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::NotAnObject => None,
            Self::MissingField { field }
            | Self::TypeMismatch { field, .. }
            | Self::EmptyString { field }
            | Self::ElementMismatch { field, .. } => Some(field.as_str()),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "request body must be a JSON object"),
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::TypeMismatch { field, expected } => {
                write!(f, "field '{field}' must be of type {expected}")
            }
            Self::EmptyString { field } => write!(f, "field '{field}' must be a non-empty string"),
            Self::ElementMismatch {
                field,
                index,
                expected,
            } => write!(f, "element {index} of field '{field}' must be of type {expected}"),
        }
    }
}

/// Outcome of validating a payload: the ordered list of violations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Violations in schema order.
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    /// Whether the payload satisfied the schema.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert into a `Result`, failing with every collected error.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when the report is not valid.
    pub fn into_result(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Validate `payload` against `schema`.
///
/// Required fields must be present and non-null. Optional fields are only
/// type checked when present and non-null. A non-object payload yields a
/// single [`FieldError::NotAnObject`].
#[must_use]
pub fn validate(payload: &Value, schema: &[FieldSpec]) -> ValidationReport {
    let Some(object) = payload.as_object() else {
        return ValidationReport {
            errors: vec![FieldError::NotAnObject],
        };
    };

    let mut errors = Vec::new();

    for spec in schema {
        let value = match object.get(&spec.name) {
            Some(Value::Null) | None => {
                if spec.required {
                    errors.push(FieldError::MissingField {
                        field: spec.name.clone(),
                    });
                }
                continue;
            }
            Some(value) => value,
        };

        if let Err(violation) = spec.field_type.check(value) {
            errors.push(violation_error(spec, violation));
            continue;
        }

        if let (FieldType::Array, Some(items), Some(elements)) =
            (&spec.field_type, &spec.items, value.as_array())
        {
            for (index, element) in elements.iter().enumerate() {
                if element.is_null() || items.check(element).is_err() {
                    errors.push(FieldError::ElementMismatch {
                        field: spec.name.clone(),
                        index,
                        expected: items.to_string(),
                    });
                }
            }
        }
    }

    ValidationReport { errors }
}

fn violation_error(spec: &FieldSpec, violation: Violation) -> FieldError {
    match violation {
        Violation::TypeMismatch => FieldError::TypeMismatch {
            field: spec.name.clone(),
            expected: spec.field_type.to_string(),
        },
        Violation::EmptyString => FieldError::EmptyString {
            field: spec.name.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn age_note_schema() -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("age", FieldType::Numeric),
            FieldSpec::optional("note", FieldType::Text),
        ]
    }

    #[test]
    fn valid_payload_passes() {
        let report = validate(&json!({ "age": 30 }), &age_note_schema());
        assert!(report.is_valid());
    }

    #[test]
    fn numeric_string_is_rejected() {
        let report = validate(&json!({ "age": "thirty" }), &age_note_schema());
        assert_eq!(
            report.errors,
            vec![FieldError::TypeMismatch {
                field: "age".into(),
                expected: "numeric".into()
            }]
        );
    }

    #[test]
    fn missing_required_field() {
        let report = validate(&json!({}), &age_note_schema());
        assert_eq!(
            report.errors,
            vec![FieldError::MissingField { field: "age".into() }]
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let report = validate(&json!({ "age": null }), &age_note_schema());
        assert_eq!(report.errors[0].field(), Some("age"));
        assert!(matches!(report.errors[0], FieldError::MissingField { .. }));
    }

    #[test]
    fn present_optional_text_must_be_non_empty() {
        let report = validate(&json!({ "age": 30, "note": "   " }), &age_note_schema());
        assert_eq!(
            report.errors,
            vec![FieldError::EmptyString { field: "note".into() }]
        );
    }

    #[test]
    fn errors_are_collected_in_schema_order() {
        let schema = vec![
            FieldSpec::required("a", FieldType::Numeric),
            FieldSpec::required("b", FieldType::Categorical),
            FieldSpec::required("c", FieldType::Array),
        ];
        let report = validate(&json!({ "b": 4, "c": "x" }), &schema);
        let fields: Vec<_> = report.errors.iter().filter_map(FieldError::field).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn non_object_body_is_a_validation_failure() {
        let report = validate(&json!([1, 2, 3]), &age_note_schema());
        assert_eq!(report.errors, vec![FieldError::NotAnObject]);
    }

    #[test]
    fn unknown_type_accepts_any_present_value() {
        let schema = vec![FieldSpec::required("blob", FieldType::from("image".to_string()))];
        assert!(validate(&json!({ "blob": { "w": 1 } }), &schema).is_valid());
        assert!(!validate(&json!({}), &schema).is_valid());
    }

    #[test]
    fn array_elements_checked_when_constrained() {
        let schema = vec![FieldSpec::required("xs", FieldType::Array).with_items(FieldType::Numeric)];
        assert!(validate(&json!({ "xs": [1, 2.5, -3] }), &schema).is_valid());

        let report = validate(&json!({ "xs": [1, "two", 3] }), &schema);
        assert_eq!(
            report.errors,
            vec![FieldError::ElementMismatch {
                field: "xs".into(),
                index: 1,
                expected: "numeric".into()
            }]
        );
    }

    #[test]
    fn unconstrained_array_accepts_mixed_elements() {
        let schema = vec![FieldSpec::required("xs", FieldType::Array)];
        assert!(validate(&json!({ "xs": [1, "a", null] }), &schema).is_valid());
    }

    #[test]
    fn field_spec_deserializes_with_default_required() {
        let spec: FieldSpec =
            serde_json::from_value(json!({ "name": "city", "type": "categorical" })).unwrap();
        assert!(spec.required);
        assert_eq!(spec.field_type, FieldType::Categorical);

        let spec: FieldSpec =
            serde_json::from_value(json!({ "name": "x", "type": "tensor", "required": false }))
                .unwrap();
        assert!(!spec.required);
        assert_eq!(spec.field_type, FieldType::Unknown("tensor".into()));
    }
}
