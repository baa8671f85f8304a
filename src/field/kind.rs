//! Field kinds and their kind-specific checks

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;

use super::Field;
use crate::schema::Schema;
use crate::validation::ValidationOptions;
use crate::violation::{Constraint, Violation};

/// Rules for text fields
#[derive(Debug, Clone, Default)]
pub struct TextRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Reject `\n` and `\r`
    pub single_line: bool,
    /// Secret text; accepts the unchanged-password marker when bound
    pub password: bool,
    /// Anchored pattern the whole text must match
    pub pattern: Option<Regex>,
}

/// Rules for list and set fields
#[derive(Debug, Clone)]
pub struct CollectionRules {
    /// Every element is validated against this field
    pub element: Box<Field>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Reject duplicate elements (always on for sets)
    pub unique: bool,
}

/// Rules for dict fields
#[derive(Debug, Clone)]
pub struct DictRules {
    /// Keys are validated as text values against this field
    pub key: Box<Field>,
    pub value: Box<Field>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

/// The kind of a field, with its kind-specific constraints
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text(TextRules),
    Bool,
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    /// RFC 3339 timestamps
    Datetime { min: Option<DateTime<Utc>>, max: Option<DateTime<Utc>> },
    Choice { values: Vec<Value> },
    List(CollectionRules),
    Set(CollectionRules),
    Dict(DictRules),
    /// A nested object validated against another schema
    Object { schema: Arc<Schema> },
}

impl FieldKind {
    /// Name used in messages and definitions
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text(rules) if rules.password => "password",
            FieldKind::Text(rules) if rules.single_line => "text_line",
            FieldKind::Text(_) => "text",
            FieldKind::Bool => "bool",
            FieldKind::Int { .. } => "int",
            FieldKind::Float { .. } => "float",
            FieldKind::Datetime { .. } => "datetime",
            FieldKind::Choice { .. } => "choice",
            FieldKind::List(_) => "list",
            FieldKind::Set(_) => "set",
            FieldKind::Dict(_) => "dict",
            FieldKind::Object { .. } => "object",
        }
    }

    /// Check the runtime type of `value`
    pub(crate) fn check_type(&self, path: &str, value: &Value) -> Result<(), Violation> {
        let ok = match self {
            FieldKind::Text(_) => value.is_string(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Int { .. } => value.as_i64().is_some(),
            FieldKind::Float { .. } => value.is_number(),
            FieldKind::Datetime { .. } => {
                match value.as_str() {
                    Some(s) => parse_datetime(s).is_some(),
                    None => false,
                }
            }
            FieldKind::Choice { .. } => true,
            FieldKind::List(_) | FieldKind::Set(_) => value.is_array(),
            FieldKind::Dict(_) | FieldKind::Object { .. } => value.is_object(),
        };

        if ok {
            Ok(())
        } else {
            Err(Violation::wrong_type(path, self.type_name(), json_type_name(value)))
        }
    }

    /// Check kind-specific constraints; `value` already passed [`Self::check_type`]
    pub(crate) fn check_constraints(
        &self,
        path: &str,
        value: &Value,
        opts: &ValidationOptions,
        out: &mut Vec<Violation>,
    ) {
        match self {
            FieldKind::Text(rules) => {
                let Some(text) = value.as_str() else { return };
                check_length(path, text.chars().count(), rules.min_length, rules.max_length, out);
                if rules.single_line && text.contains(['\n', '\r']) {
                    out.push(Violation::constraint(path, Constraint::NotSingleLine));
                }
                if let Some(re) = &rules.pattern {
                    if !re.is_match(text) {
                        out.push(Violation::constraint_with(
                            path,
                            Constraint::PatternMismatch,
                            re.as_str(),
                        ));
                    }
                }
            }
            FieldKind::Bool => {}
            FieldKind::Int { min, max } => {
                if let Some(n) = value.as_i64() {
                    check_range(path, n, *min, *max, out);
                }
            }
            FieldKind::Float { min, max } => {
                if let Some(n) = value.as_f64() {
                    check_range(path, n, *min, *max, out);
                }
            }
            FieldKind::Datetime { min, max } => {
                if let Some(dt) = value.as_str().and_then(parse_datetime) {
                    check_range(path, dt, *min, *max, out);
                }
            }
            FieldKind::Choice { values } => {
                if !values.contains(value) {
                    out.push(Violation::not_in_choices(path, value));
                }
            }
            FieldKind::List(rules) => check_collection(path, value, rules, rules.unique, opts, out),
            FieldKind::Set(rules) => check_collection(path, value, rules, true, opts, out),
            FieldKind::Dict(rules) => {
                let Some(map) = value.as_object() else { return };
                check_length(path, map.len(), rules.min_length, rules.max_length, out);
                for (key, item) in map {
                    let item_path = format!("{}[{}]", path, key);
                    let key_value = Value::String(key.clone());
                    rules.key.validate_at(&item_path, Some(&key_value), opts, out);
                    rules.value.validate_at(&item_path, Some(item), opts, out);
                }
            }
            FieldKind::Object { schema } => {
                schema.validate_fields_at(path, value, opts, out);
            }
        }
    }

    /// Parse a textual representation into a value of this kind
    pub(crate) fn parse_text(&self, text: &str) -> Option<Value> {
        match self {
            FieldKind::Text(_) => Some(Value::String(text.to_string())),
            FieldKind::Bool => Some(Value::Bool(text == "true" || text == "True")),
            FieldKind::Int { .. } => text.trim().parse::<i64>().ok().map(Value::from),
            FieldKind::Float { .. } => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            FieldKind::Datetime { .. } => {
                parse_datetime(text.trim()).map(|dt| Value::String(dt.to_rfc3339()))
            }
            FieldKind::Choice { values } => values
                .iter()
                .find(|v| match v {
                    Value::String(s) => s == text,
                    other => other.to_string() == text,
                })
                .cloned(),
            FieldKind::List(_)
            | FieldKind::Set(_)
            | FieldKind::Dict(_)
            | FieldKind::Object { .. } => serde_json::from_str(text).ok(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

fn check_collection(
    path: &str,
    value: &Value,
    rules: &CollectionRules,
    unique: bool,
    opts: &ValidationOptions,
    out: &mut Vec<Violation>,
) {
    let Some(items) = value.as_array() else { return };
    check_length(path, items.len(), rules.min_length, rules.max_length, out);

    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{}[{}]", path, i);
        let start = out.len();

        if unique && items[..i].contains(item) {
            out.push(Violation::constraint(item_path.as_str(), Constraint::NotUnique));
        }
        rules.element.validate_at(&item_path, Some(item), opts, out);

        for v in &mut out[start..] {
            v.index.get_or_insert(i);
        }
    }
}

fn check_length(
    path: &str,
    len: usize,
    min: Option<usize>,
    max: Option<usize>,
    out: &mut Vec<Violation>,
) {
    if let Some(min) = min {
        if len < min {
            out.push(Violation::constraint_with(
                path,
                Constraint::TooShort,
                format!("length {} < {}", len, min),
            ));
        }
    }
    if let Some(max) = max {
        if len > max {
            out.push(Violation::constraint_with(
                path,
                Constraint::TooLong,
                format!("length {} > {}", len, max),
            ));
        }
    }
}

fn check_range<T: PartialOrd + fmt::Display>(
    path: &str,
    value: T,
    min: Option<T>,
    max: Option<T>,
    out: &mut Vec<Violation>,
) {
    if let Some(min) = min {
        if value < min {
            out.push(Violation::constraint_with(
                path,
                Constraint::TooSmall,
                format!("{} < {}", value, min),
            ));
        }
    }
    if let Some(max) = max {
        if value > max {
            out.push(Violation::constraint_with(
                path,
                Constraint::TooBig,
                format!("{} > {}", value, max),
            ));
        }
    }
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// JSON type name for messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() => "int",
        Value::Number(n) if n.is_u64() => "unsigned int out of range",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_type_check() {
        let kind = FieldKind::Int { min: None, max: None };
        assert!(kind.check_type("n", &json!(3)).is_ok());
        assert!(kind.check_type("n", &json!(3.5)).is_err());
        assert!(kind.check_type("n", &json!("3")).is_err());
        assert!(kind.check_type("n", &json!(true)).is_err());
    }

    #[test]
    fn test_float_accepts_integers() {
        let kind = FieldKind::Float { min: Some(0.5), max: Some(2.0) };
        assert!(kind.check_type("x", &json!(1)).is_ok());

        let mut out = Vec::new();
        kind.check_constraints("x", &json!(0), &ValidationOptions::default(), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind.constraint(), Some(Constraint::TooSmall));

        out.clear();
        kind.check_constraints("x", &json!(2.1), &ValidationOptions::default(), &mut out);
        assert_eq!(out[0].kind.constraint(), Some(Constraint::TooBig));
    }

    #[test]
    fn test_int_rejects_values_beyond_i64() {
        let kind = FieldKind::Int { min: None, max: None };
        let violation = kind.check_type("n", &json!(u64::MAX)).unwrap_err();
        assert!(violation.message.contains("got unsigned int out of range"), "{}", violation);
    }

    #[test]
    fn test_datetime_must_parse() {
        let kind = FieldKind::Datetime { min: None, max: None };
        assert!(kind.check_type("at", &json!("2000-10-01T00:00:00Z")).is_ok());
        assert!(kind.check_type("at", &json!("2000-10-01T00:00:00+02:00")).is_ok());
        assert!(kind.check_type("at", &json!("yesterday")).is_err());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(FieldKind::Bool.parse_text("True"), Some(json!(true)));
        assert_eq!(FieldKind::Bool.parse_text("1"), Some(json!(false)));
        assert_eq!(FieldKind::Int { min: None, max: None }.parse_text("-1"), Some(json!(-1)));
        assert_eq!(FieldKind::Int { min: None, max: None }.parse_text("True"), None);

        let choice = FieldKind::Choice { values: vec![json!("red"), json!(7)] };
        assert_eq!(choice.parse_text("red"), Some(json!("red")));
        assert_eq!(choice.parse_text("7"), Some(json!(7)));
        assert_eq!(choice.parse_text("blue"), None);
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&json!(1)), "int");
        assert_eq!(json_type_name(&json!(u64::MAX)), "unsigned int out of range");
        assert_eq!(json_type_name(&json!(1.5)), "float");
        assert_eq!(json_type_name(&json!(null)), "null");
    }
}
