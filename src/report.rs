//! Validation reports

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::violation::{Violation, ViolationKind};

/// Every violation found in one validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Name of the schema that was validated against
    pub schema: String,
    /// Violations in field order
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(schema: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            schema: schema.into(),
            violations,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations under the top-level field `name` (including nested paths)
    pub fn for_field<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.root_field() == name)
    }

    /// Violations of one kind
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> + '_ {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// `Ok(())` when valid, otherwise the report itself
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Append another report's violations
    pub fn merge(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "{}: valid", self.schema);
        }
        writeln!(f, "{}: {} violation(s)", self.schema, self.violations.len())?;
        for v in &self.violations {
            writeln!(f, "  {}", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::Constraint;

    #[test]
    fn test_for_field_includes_nested_paths() {
        let report = ValidationReport::new(
            "Person",
            vec![
                Violation::missing("address.city"),
                Violation::constraint("age", Constraint::TooSmall),
                Violation::constraint("tags[1]", Constraint::TooLong),
            ],
        );
        assert_eq!(report.for_field("address").count(), 1);
        assert_eq!(report.for_field("age").count(), 1);
        assert_eq!(report.for_field("tags").count(), 1);
        assert_eq!(report.of_kind(ViolationKind::MissingValue).count(), 1);
    }

    #[test]
    fn test_into_result() {
        let ok = ValidationReport::new("Empty", Vec::new());
        assert!(ok.into_result().is_ok());

        let bad = ValidationReport::new("Person", vec![Violation::missing("name")]);
        let err = bad.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.to_string().contains("1 violation(s)"));
    }
}
