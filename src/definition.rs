//! Declarative schema definitions
//!
//! Schemas can be written as data instead of code. A definition file holds
//! either one schema or a list under `schemas`:
//!
//! ```toml
//! [[schemas]]
//! name = "Person"
//! extends = ["Named"]
//!
//! [[schemas.fields]]
//! name = "age"
//! type = "int"
//! min = 0
//! required = false
//!
//! [[schemas.fields]]
//! name = "address"
//! type = "object"
//! schema = "Address"
//! ```
//!
//! Unknown keys are rejected, and every rule goes through [`FieldBuilder`],
//! so an option that does not apply to the field's type is an error rather
//! than silently ignored. Definitions only describe data; predicates, hooks
//! and invariants are attached in code.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, SchemaError};
use crate::field::Field;
use crate::schema::Schema;

/// One schema, as written in a definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base schema names, highest precedence first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Field type names used in definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    TextLine,
    Password,
    Bool,
    Int,
    Float,
    Datetime,
    Choice,
    List,
    Set,
    Dict,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::TextLine => "text_line",
            FieldType::Password => "password",
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Datetime => "datetime",
            FieldType::Choice => "choice",
            FieldType::List => "list",
            FieldType::Set => "set",
            FieldType::Dict => "dict",
            FieldType::Object => "object",
        }
    }

    /// Whether the structural key `part` belongs to this type
    fn takes(&self, part: &str) -> bool {
        matches!(
            (part, self),
            ("values", FieldType::Choice)
                | ("element", FieldType::List | FieldType::Set)
                | ("key" | "value", FieldType::Dict)
                | ("schema", FieldType::Object)
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field, as written in a definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    /// May be omitted for list/set elements and dict keys/values
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_value: Option<Value>,

    // Rules, checked against the type by the field builder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,

    // Structure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Box<FieldDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<FieldDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<FieldDefinition>>,
    /// Schema name of an object field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A file holding several definitions
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionSet {
    schemas: Vec<SchemaDefinition>,
}

/// Format of a definition file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Toml,
}

impl DefinitionFormat {
    /// Format from a file extension (`.json` / `.toml`)
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(DefinitionFormat::Json),
            Some("toml") => Some(DefinitionFormat::Toml),
            _ => None,
        }
    }
}

/// Parse the definitions contained in `content`
pub fn parse_definitions(
    content: &str,
    format: DefinitionFormat,
) -> Result<Vec<SchemaDefinition>> {
    let document: Value = match format {
        DefinitionFormat::Json => serde_json::from_str(content)?,
        DefinitionFormat::Toml => toml::from_str(content)?,
    };

    if document.get("schemas").is_some() {
        let set: DefinitionSet = serde_json::from_value(document)?;
        Ok(set.schemas)
    } else {
        Ok(vec![serde_json::from_value(document)?])
    }
}

/// Read and parse a definition file; the format follows the extension
pub fn load_definitions(path: &Path) -> Result<Vec<SchemaDefinition>> {
    let format = DefinitionFormat::from_path(path).ok_or_else(|| {
        SchemaError::InvalidDefinition(format!("unsupported definition file {}", path.display()))
    })?;
    let content = std::fs::read_to_string(path)?;
    parse_definitions(&content, format)
        .map_err(|e| SchemaError::InvalidDefinition(format!("{}: {}", path.display(), e)))
}

impl SchemaDefinition {
    /// Names of every schema this definition depends on
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = self.extends.iter().map(String::as_str).collect();
        for field in &self.fields {
            field.collect_references(&mut deps);
        }
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// Build the schema; `lookup` resolves bases and object references
    pub fn build(&self, lookup: &dyn Fn(&str) -> Result<Arc<Schema>>) -> Result<Schema> {
        let mut builder = Schema::builder(self.name.clone());
        if let Some(title) = &self.title {
            builder = builder.title(title.clone());
        }
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }
        for base in &self.extends {
            builder = builder.extends(lookup(base)?);
        }
        for field in &self.fields {
            builder = builder.field(field.build(lookup)?);
        }
        builder.build()
    }
}

impl FieldDefinition {
    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(schema) = &self.schema {
            out.push(schema);
        }
        for part in [&self.element, &self.key, &self.value].into_iter().flatten() {
            part.collect_references(out);
        }
    }

    /// Build the field; `lookup` resolves object references
    pub fn build(&self, lookup: &dyn Fn(&str) -> Result<Arc<Schema>>) -> Result<Field> {
        self.check_structure()?;

        let name = self.name.clone();
        let mut builder = match self.kind {
            FieldType::Text => Field::text(name),
            FieldType::TextLine => Field::text_line(name),
            FieldType::Password => Field::password(name),
            FieldType::Bool => Field::bool(name),
            FieldType::Int => Field::int(name),
            FieldType::Float => Field::float(name),
            FieldType::Datetime => Field::datetime(name),
            FieldType::Choice => Field::choice(name, self.part("values", &self.values)?.clone()),
            FieldType::List => {
                Field::list(name, self.part("element", &self.element)?.build(lookup)?)
            }
            FieldType::Set => Field::set(name, self.part("element", &self.element)?.build(lookup)?),
            FieldType::Dict => Field::dict(
                name,
                self.part("key", &self.key)?.build(lookup)?,
                self.part("value", &self.value)?.build(lookup)?,
            ),
            FieldType::Object => Field::object(name, lookup(self.part("schema", &self.schema)?)?),
        };

        builder = builder
            .title(self.title.clone())
            .description(self.description.clone())
            .required(self.required)
            .readonly(self.readonly);
        if let Some(min) = &self.min {
            builder = builder.min(min.clone());
        }
        if let Some(max) = &self.max {
            builder = builder.max(max.clone());
        }
        if let Some(len) = self.min_length {
            builder = builder.min_length(len);
        }
        if let Some(len) = self.max_length {
            builder = builder.max_length(len);
        }
        if let Some(pattern) = &self.pattern {
            builder = builder.pattern(pattern.clone());
        }
        if let Some(unique) = self.unique {
            builder = builder.unique(unique);
        }
        if let Some(default) = &self.default {
            builder = builder.default(default.clone());
        }
        if let Some(missing) = &self.missing_value {
            builder = builder.missing_value(missing.clone());
        }
        builder.build()
    }

    /// Reject structural keys that belong to another type
    fn check_structure(&self) -> Result<()> {
        let present = [
            ("values", self.values.is_some()),
            ("element", self.element.is_some()),
            ("key", self.key.is_some()),
            ("value", self.value.is_some()),
            ("schema", self.schema.is_some()),
        ];
        match present.iter().find(|(part, set)| *set && !self.kind.takes(part)) {
            Some((part, _)) => {
                Err(self.invalid(format!("'{}' does not apply to {} fields", part, self.kind)))
            }
            None => Ok(()),
        }
    }

    fn part<'a, T>(&self, key: &str, value: &'a Option<T>) -> Result<&'a T> {
        value
            .as_ref()
            .ok_or_else(|| self.invalid(format!("{} fields need '{}'", self.kind, key)))
    }

    fn invalid(&self, reason: String) -> SchemaError {
        SchemaError::InvalidField {
            field: self.name.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_refs(name: &str) -> Result<Arc<Schema>> {
        Err(SchemaError::UnknownSchema {
            name: name.to_string(),
            suggestion: None,
        })
    }

    #[test]
    fn test_parse_single_json_definition() {
        let content = r#"{
            "name": "Person",
            "fields": [
                {"name": "name", "type": "text_line", "max_length": 40},
                {"name": "age", "type": "int", "min": 0, "required": false}
            ]
        }"#;
        let defs = parse_definitions(content, DefinitionFormat::Json).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].fields.len(), 2);
        assert!(!defs[0].fields[1].required);

        let schema = defs[0].build(&no_refs).unwrap();
        assert_eq!(schema.names(), vec!["name", "age"]);
        assert!(schema.validate_object(&json!({"name": "Ada"})).is_valid());
        assert!(!schema.validate_object(&json!({"name": "Ada", "age": -1})).is_valid());
    }

    #[test]
    fn test_parse_toml_many() {
        let content = r#"
            [[schemas]]
            name = "Tagged"

            [[schemas.fields]]
            name = "tags"
            type = "set"
            max_length = 3
            element = { type = "text_line" }

            [[schemas.fields]]
            name = "status"
            type = "choice"
            values = ["draft", "published"]
            default = "draft"
        "#;
        let defs = parse_definitions(content, DefinitionFormat::Toml).unwrap();
        let schema = defs[0].build(&no_refs).unwrap();

        let report = schema.validate_object(&json!({"tags": ["a", "a"]}));
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations[0].field, "tags[1]");
    }

    #[test]
    fn test_dependencies() {
        let content = r#"{
            "name": "Order",
            "extends": ["Entity"],
            "fields": [
                {"name": "customer", "type": "object", "schema": "Customer"},
                {"name": "lines", "type": "list", "element": {"type": "object", "schema": "Line"}}
            ]
        }"#;
        let defs = parse_definitions(content, DefinitionFormat::Json).unwrap();
        assert_eq!(defs[0].dependencies(), vec!["Customer", "Entity", "Line"]);
        assert!(matches!(defs[0].build(&no_refs), Err(SchemaError::UnknownSchema { .. })));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let content = r#"{"name": "Bad", "fields": [{"name": "x", "type": "complex"}]}"#;
        assert!(parse_definitions(content, DefinitionFormat::Json).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DefinitionFormat::from_path(Path::new("a/b.json")),
            Some(DefinitionFormat::Json)
        );
        assert_eq!(DefinitionFormat::from_path(Path::new("b.toml")), Some(DefinitionFormat::Toml));
        assert_eq!(DefinitionFormat::from_path(Path::new("b.yaml")), None);
    }

    // =========================================================================
    // Rejected keys
    // =========================================================================

    #[test]
    fn test_rule_for_other_type_rejected() {
        let content = r#"{"name": "Bad", "fields": [{"name": "x", "type": "text", "min": 1}]}"#;
        let defs = parse_definitions(content, DefinitionFormat::Json).unwrap();
        match defs[0].build(&no_refs) {
            Err(SchemaError::InvalidField { field, .. }) => assert_eq!(field, "x"),
            other => panic!("Expected InvalidField, got {:?}", other),
        }
    }

    #[test]
    fn test_misspelled_key_rejected() {
        let content = r#"{"name": "Bad", "fields": [
            {"name": "x", "type": "text", "max_lenght": 3}
        ]}"#;
        let err = parse_definitions(content, DefinitionFormat::Json).unwrap_err();
        assert!(err.to_string().contains("max_lenght"), "{}", err);

        let content = "name = \"Bad\"\ntitel = \"typo\"\n";
        assert!(parse_definitions(content, DefinitionFormat::Toml).is_err());
    }

    #[test]
    fn test_structure_for_other_type_rejected() {
        let content = r#"{"name": "Bad", "fields": [
            {"name": "x", "type": "int", "element": {"type": "int"}}
        ]}"#;
        let defs = parse_definitions(content, DefinitionFormat::Json).unwrap();
        match defs[0].build(&no_refs) {
            Err(SchemaError::InvalidField { reason, .. }) => {
                assert!(reason.contains("'element'"), "{}", reason)
            }
            other => panic!("Expected InvalidField, got {:?}", other),
        }

        let content = r#"{"name": "Bad", "fields": [{"name": "c", "type": "choice"}]}"#;
        let defs = parse_definitions(content, DefinitionFormat::Json).unwrap();
        assert!(matches!(defs[0].build(&no_refs), Err(SchemaError::InvalidField { .. })));
    }

    #[test]
    fn test_password_definition() {
        let content = r#"{"name": "Login", "fields": [{"name": "secret", "type": "password"}]}"#;
        let defs = parse_definitions(content, DefinitionFormat::Json).unwrap();
        let schema = defs[0].build(&no_refs).unwrap();
        assert!(schema.field("secret").unwrap().is_password());
        assert!(!schema.validate_object(&json!({"secret": "a\nb"})).is_valid());
    }
}
