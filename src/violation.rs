//! Violations produced by field and schema validation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which constraint a value failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Below the inclusive minimum
    TooSmall,
    /// Above the inclusive maximum
    TooBig,
    /// Fewer items (or characters) than the minimum length
    TooShort,
    /// More items (or characters) than the maximum length
    TooLong,
    /// Duplicate element in a collection that requires uniqueness
    NotUnique,
    /// Text does not match the field pattern
    PatternMismatch,
    /// Line breaks in a single-line text field
    NotSingleLine,
    /// The field's constraint predicate returned false
    Predicate,
    /// A validation hook reported a failure (or panicked)
    Hook,
}

impl Constraint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Constraint::TooSmall => "too_small",
            Constraint::TooBig => "too_big",
            Constraint::TooShort => "too_short",
            Constraint::TooLong => "too_long",
            Constraint::NotUnique => "not_unique",
            Constraint::PatternMismatch => "pattern_mismatch",
            Constraint::NotSingleLine => "not_single_line",
            Constraint::Predicate => "predicate",
            Constraint::Hook => "hook",
        }
    }

    /// Short human description used as the default message
    pub fn describe(&self) -> &'static str {
        match self {
            Constraint::TooSmall => "Value is too small",
            Constraint::TooBig => "Value is too big",
            Constraint::TooShort => "Value is too short",
            Constraint::TooLong => "Value is too long",
            Constraint::NotUnique => "Value is not unique",
            Constraint::PatternMismatch => "Value does not match the pattern",
            Constraint::NotSingleLine => "Value must be a single line",
            Constraint::Predicate => "Constraint not satisfied",
            Constraint::Hook => "Validation hook failed",
        }
    }
}

/// Kind of violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "constraint")]
pub enum ViolationKind {
    /// Required input is missing
    MissingValue,
    /// Value is of the wrong type for the field kind
    TypeMismatch,
    /// Value failed a declared constraint
    ConstraintViolation(Constraint),
    /// Value is not one of the allowed choices
    NotInChoices,
    /// A read-only field was changed
    ReadOnlyViolation,
    /// A schema invariant over the whole object failed
    InvariantViolation,
}

impl ViolationKind {
    pub fn is_constraint(&self) -> bool {
        matches!(self, ViolationKind::ConstraintViolation(_))
    }

    /// The constraint detail, if this is a constraint violation
    pub fn constraint(&self) -> Option<Constraint> {
        match self {
            ViolationKind::ConstraintViolation(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::MissingValue => write!(f, "missing_value"),
            ViolationKind::TypeMismatch => write!(f, "type_mismatch"),
            ViolationKind::ConstraintViolation(c) => {
                write!(f, "constraint_violation({})", c.as_str())
            }
            ViolationKind::NotInChoices => write!(f, "not_in_choices"),
            ViolationKind::ReadOnlyViolation => write!(f, "read_only_violation"),
            ViolationKind::InvariantViolation => write!(f, "invariant_violation"),
        }
    }
}

/// One constraint failure
///
/// `field` is the path of the offending value: `age`, `tags[2]`,
/// `address.city`, `labels[en]`. Invariant violations carry the path of the
/// object the invariant belongs to (empty at the top level) and name the
/// invariant in their message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Path of the offending value
    pub field: String,
    /// Index of the offending element when it came from a collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Kind of violation
    #[serde(flatten)]
    pub kind: ViolationKind,
    /// Human-readable message
    pub message: String,
}

impl Violation {
    /// Create a violation with an explicit message
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            index: None,
            kind,
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, ViolationKind::MissingValue, "Required input is missing")
    }

    pub fn wrong_type(field: impl Into<String>, expected: &str, found: &str) -> Self {
        Self::new(
            field,
            ViolationKind::TypeMismatch,
            format!("Object is of wrong type: expected {}, got {}", expected, found),
        )
    }

    /// Constraint violation using the constraint's default message
    pub fn constraint(field: impl Into<String>, constraint: Constraint) -> Self {
        Self::new(field, ViolationKind::ConstraintViolation(constraint), constraint.describe())
    }

    pub fn constraint_with(
        field: impl Into<String>,
        constraint: Constraint,
        detail: impl fmt::Display,
    ) -> Self {
        Self::new(
            field,
            ViolationKind::ConstraintViolation(constraint),
            format!("{}: {}", constraint.describe(), detail),
        )
    }

    pub fn not_in_choices(field: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::new(
            field,
            ViolationKind::NotInChoices,
            format!("Value {} is not one of the allowed choices", value),
        )
    }

    pub fn read_only(field: impl Into<String>) -> Self {
        Self::new(field, ViolationKind::ReadOnlyViolation, "Field is read-only")
    }

    /// The top-level field this violation belongs to
    pub fn root_field(&self) -> &str {
        let end = self
            .field
            .find(|c| c == '.' || c == '[')
            .unwrap_or(self.field.len());
        &self.field[..end]
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_field() {
        let v = Violation::missing("address.city");
        assert_eq!(v.root_field(), "address");

        let v = Violation::missing("tags[2]");
        assert_eq!(v.root_field(), "tags");

        let v = Violation::missing("age");
        assert_eq!(v.root_field(), "age");
    }

    #[test]
    fn test_serialize_kind() {
        let v = Violation::constraint("age", Constraint::TooSmall);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "constraint_violation");
        assert_eq!(json["constraint"], "too_small");
        assert_eq!(json["field"], "age");
    }
}
