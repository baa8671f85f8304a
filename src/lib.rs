//! Field Schemas
//!
//! Typed, constrained attribute descriptors ("fields") composed into
//! schemas, with exhaustive validation of dynamic values and whole objects.
//!
//! ## Features
//!
//! - **Field kinds**: text, text line, bool, int, float, datetime, choice,
//!   list, set, dict and nested objects
//! - **Constraints**: required / read-only flags, defaults, ranges, lengths,
//!   patterns, uniqueness, predicates and custom validation hooks
//! - **Composition**: schemas extend other schemas; child fields override
//!   base fields, leftmost base wins across bases
//! - **Exhaustive reports**: validation never stops at the first problem
//! - **Definitions**: schemas can be declared in JSON or TOML and loaded into
//!   a [`SchemaRegistry`]
//!
//! ## Example
//!
//! ```
//! use field_schemas::{Field, Schema};
//! use serde_json::json;
//!
//! let person = Schema::builder("Person")
//!     .field(Field::text_line("name").build()?)
//!     .field(Field::int("age").min(0).required(false).build()?)
//!     .build()?;
//!
//! let report = person.validate_object(&json!({"name": "Ada", "age": -1}));
//! assert!(!report.is_valid());
//! assert_eq!(report.violations[0].field, "age");
//! # Ok::<(), field_schemas::SchemaError>(())
//! ```

pub mod attributes;
pub mod config;
pub mod definition;
pub mod error;
pub mod field;
pub mod registry;
pub mod report;
pub mod schema;
pub mod validation;
pub mod violation;

pub use attributes::{Attributes, AttributesMut};
pub use config::FieldsConfig;
pub use definition::{FieldDefinition, FieldType, SchemaDefinition};
pub use error::{Result, SchemaError};
pub use field::{unchanged_password, Field, FieldBuilder, FieldKind, StopValidation};
pub use registry::SchemaRegistry;
pub use report::ValidationReport;
pub use schema::{Schema, SchemaBuilder};
pub use validation::{check_readonly, validate, validate_object, ValidationOptions};
pub use violation::{Constraint, Violation, ViolationKind};
