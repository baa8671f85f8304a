//! Validation entry points
//!
//! Thin free-function forms of the validation operations, plus the options
//! that tune a validation pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::Attributes;
use crate::field::Field;
use crate::report::ValidationReport;
use crate::schema::Schema;
use crate::violation::Violation;

/// Options for a validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Contain panics raised by predicates and hooks
    #[serde(default = "default_true")]
    pub catch_hook_panics: bool,
    /// Run schema invariants when all fields are valid
    #[serde(default = "default_true")]
    pub run_invariants: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            catch_hook_panics: true,
            run_invariants: true,
        }
    }
}

/// Validate one value against one field; `None` means absent
pub fn validate(field: &Field, value: Option<&Value>) -> Vec<Violation> {
    field.validate(value)
}

/// Validate every field of `schema` against the attributes of `obj`
pub fn validate_object<A: Attributes>(schema: &Schema, obj: &A) -> ValidationReport {
    schema.validate_object(obj)
}

/// Report read-only fields among `changed`
pub fn check_readonly<A: Attributes>(
    schema: &Schema,
    obj: &A,
    changed: &[&str],
) -> ValidationReport {
    schema.check_readonly(obj, changed)
}
