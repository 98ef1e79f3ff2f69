//! Argument validation against an operation's declared schema.
//!
//! Validation is pure: the same raw arguments can be re-validated safely.
//! Declared defaults are filled for absent optional fields before the
//! handler ever sees the arguments.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{FieldKind, InputSchema};

/// Validation failures, surfaced back into the conversation as data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("arguments must be a JSON object, got {actual}")]
    InvalidPayload { actual: String },

    #[error("unknown field: {field}")]
    UnknownField { field: String },
}

/// Arguments that passed validation, with typed accessors.
#[derive(Debug, Clone)]
pub struct ValidatedArguments {
    values: Map<String, Value>,
}

impl ValidatedArguments {
    /// Wraps an already-vetted map. Handler unit tests use this to skip the
    /// schema pass.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_str())
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(|v| v.as_i64())
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(|v| v.as_f64())
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(|v| v.as_bool())
    }

    pub fn str_array(&self, name: &str) -> Option<Vec<&str>> {
        self.values
            .get(name)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|i| i.as_str()).collect())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

/// Check `raw` against `schema`, filling defaults for absent optionals.
///
/// Unknown fields are dropped unless the schema denies them. `null` is
/// treated the same as absent, matching how LLM tool calls commonly encode
/// "no value".
pub fn validate(schema: &InputSchema, raw: &Value) -> Result<ValidatedArguments, ValidationError> {
    let empty = Map::new();
    let object = match raw {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ValidationError::InvalidPayload {
                actual: type_name(other).to_string(),
            })
        }
    };

    if schema.rejects_unknown() {
        for key in object.keys() {
            if schema.get(key).is_none() {
                return Err(ValidationError::UnknownField { field: key.clone() });
            }
        }
    }

    let mut values = Map::new();

    for field in schema.fields() {
        match object.get(&field.name) {
            Some(value) if !value.is_null() => {
                if !kind_matches(&field.kind, value) {
                    return Err(ValidationError::TypeMismatch {
                        field: field.name.clone(),
                        expected: field.kind.label(),
                        actual: type_name(value).to_string(),
                    });
                }
                values.insert(field.name.clone(), value.clone());
            }
            _ => {
                if let Some(default) = &field.default {
                    values.insert(field.name.clone(), default.clone());
                } else if field.required {
                    return Err(ValidationError::MissingField {
                        field: field.name.clone(),
                    });
                }
            }
        }
    }

    Ok(ValidatedArguments { values })
}

fn kind_matches(kind: &FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Number => value.is_number(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::StringArray => value
            .as_array()
            .map(|items| items.iter().all(|i| i.is_string()))
            .unwrap_or(false),
        FieldKind::Enum(variants) => value
            .as_str()
            .map(|s| variants.iter().any(|v| v == s))
            .unwrap_or(false),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
