//! Declarative input schemas for operations.
//!
//! A schema is a closed set of named fields over primitive, array, and enum
//! kinds. It validates raw invocation arguments once at the boundary and
//! renders to a JSON Schema object for the LLM catalog and the listing
//! endpoints.

use serde_json::{json, Value};

/// The type a field's runtime value must have.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    StringArray,
    /// A string restricted to a fixed set of variants.
    Enum(Vec<String>),
}

impl FieldKind {
    /// Human-readable name used in type-mismatch messages.
    pub fn label(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Integer => "integer".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::StringArray => "array of strings".to_string(),
            FieldKind::Enum(variants) => format!("one of [{}]", variants.join(", ")),
        }
    }

    fn json_fragment(&self, description: &str) -> Value {
        match self {
            FieldKind::String => json!({ "type": "string", "description": description }),
            FieldKind::Number => json!({ "type": "number", "description": description }),
            FieldKind::Integer => json!({ "type": "integer", "description": description }),
            FieldKind::Boolean => json!({ "type": "boolean", "description": description }),
            FieldKind::StringArray => json!({
                "type": "array",
                "items": { "type": "string" },
                "description": description
            }),
            FieldKind::Enum(variants) => json!({
                "type": "string",
                "enum": variants,
                "description": description
            }),
        }
    }
}

/// One declared field of an operation's input.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, FieldKind::String)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, FieldKind::Integer)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, FieldKind::Number)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, FieldKind::Boolean)
    }

    pub fn string_array(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, FieldKind::StringArray)
    }

    pub fn enumeration(
        name: impl Into<String>,
        description: impl Into<String>,
        variants: &[&str],
    ) -> Self {
        Self::new(
            name,
            description,
            FieldKind::Enum(variants.iter().map(|v| v.to_string()).collect()),
        )
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Fill the field with this value when absent from the arguments.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// An ordered collection of field specs.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
    deny_unknown: bool,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, preserving declaration order.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Reject arguments carrying fields the schema does not declare.
    /// The default is to ignore extras for forward compatibility.
    pub fn deny_unknown(mut self) -> Self {
        self.deny_unknown = true;
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn rejects_unknown(&self) -> bool {
        self.deny_unknown
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the required fields, in declaration order.
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Render as a JSON Schema object for catalogs and tool definitions.
    pub fn to_json(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                field.kind.json_fragment(&field.description),
            );
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_builders() {
        let field = FieldSpec::string("symbol", "The cryptocurrency symbol").required();
        assert_eq!(field.name, "symbol");
        assert!(field.required);
        assert!(field.default.is_none());
        assert_eq!(field.kind, FieldKind::String);

        let field = FieldSpec::integer("limit", "Result count").with_default(json!(5));
        assert!(!field.required);
        assert_eq!(field.default, Some(json!(5)));
    }

    #[test]
    fn test_enum_label_lists_variants() {
        let kind = FieldKind::Enum(vec!["1h".to_string(), "1d".to_string()]);
        assert_eq!(kind.label(), "one of [1h, 1d]");
    }

    #[test]
    fn test_schema_to_json() {
        let schema = InputSchema::new()
            .field(FieldSpec::string("symbol", "The symbol").required())
            .field(FieldSpec::integer("period", "RSI period").with_default(json!(14)));

        let rendered = schema.to_json();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["symbol"]["type"], "string");
        assert_eq!(rendered["properties"]["period"]["type"], "integer");
        assert_eq!(rendered["required"], json!(["symbol"]));
    }

    #[test]
    fn test_schema_preserves_field_order() {
        let schema = InputSchema::new()
            .field(FieldSpec::string("b", ""))
            .field(FieldSpec::string("a", ""));

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_required_fields() {
        let schema = InputSchema::new()
            .field(FieldSpec::string("symbol", "").required())
            .field(FieldSpec::enumeration("timeframe", "", &["1h", "1d"]));

        assert_eq!(schema.required_fields(), vec!["symbol"]);
        assert!(schema.get("timeframe").is_some());
        assert!(schema.get("missing").is_none());
    }
}
