//! Schemas: ordered, composable sets of fields
//!
//! A schema's field table is resolved once, when the schema is built:
//!
//! - fields of the bases come first, left to right, in the order they appear
//!   in each base's own resolved table;
//! - when several bases define the same name, the leftmost base wins;
//! - the schema's own fields override base fields of the same name (keeping
//!   the overridden field's position) and are otherwise appended.
//!
//! Invariants resolve the same way by name.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::attributes::Attributes;
use crate::error::{Result, SchemaError};
use crate::field::{contain, Field, StopValidation};
use crate::report::ValidationReport;
use crate::validation::ValidationOptions;
use crate::violation::{Violation, ViolationKind};

/// Whole-object check: `Err` describes why the object is invalid
pub type Invariant = Arc<dyn Fn(&dyn Attributes) -> anyhow::Result<()> + Send + Sync>;

/// An ordered set of named fields, optionally extending other schemas
#[derive(Clone)]
pub struct Schema {
    name: String,
    title: Option<String>,
    description: Option<String>,
    bases: Vec<Arc<Schema>>,
    own_fields: Vec<Arc<Field>>,
    own_invariants: Vec<(String, Invariant)>,
    fields: Vec<Arc<Field>>,
    index: HashMap<String, usize>,
    invariants: Vec<(String, Invariant)>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Direct bases, highest precedence first
    pub fn bases(&self) -> &[Arc<Schema>] {
        &self.bases
    }

    /// Resolved fields (own + inherited), in order
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().map(|f| f.as_ref())
    }

    /// Resolved field names, in order
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| self.fields[i].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of the resolved invariants, in order
    pub fn invariant_names(&self) -> Vec<&str> {
        self.invariants.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Whether this schema is `name` or extends it, directly or not
    pub fn is_or_extends(&self, name: &str) -> bool {
        self.name == name || self.bases.iter().any(|b| b.is_or_extends(name))
    }

    /// A copy of this schema with `base` appended as its lowest-precedence base.
    ///
    /// Fields defined here keep shadowing `base`'s fields of the same name.
    pub fn extend(&self, base: impl Into<Arc<Schema>>) -> Schema {
        let mut bases = self.bases.clone();
        bases.push(base.into());
        Self::resolve(
            self.name.clone(),
            self.title.clone(),
            self.description.clone(),
            bases,
            self.own_fields.clone(),
            self.own_invariants.clone(),
        )
    }

    /// Validate `obj` against every resolved field
    pub fn validate_object<A: Attributes>(&self, obj: &A) -> ValidationReport {
        self.validate_object_with(obj, &ValidationOptions::default())
    }

    pub fn validate_object_with<A: Attributes>(
        &self,
        obj: &A,
        opts: &ValidationOptions,
    ) -> ValidationReport {
        let mut violations = Vec::new();
        self.validate_fields_at("", obj, opts, &mut violations);
        debug!(
            schema = %self.name,
            fields = self.fields.len(),
            violations = violations.len(),
            "validated object"
        );
        ValidationReport::new(self.name.clone(), violations)
    }

    /// Validate the attributes of `obj` with paths prefixed by `prefix`
    pub(crate) fn validate_fields_at(
        &self,
        prefix: &str,
        obj: &dyn Attributes,
        opts: &ValidationOptions,
        out: &mut Vec<Violation>,
    ) {
        let start = out.len();
        for field in &self.fields {
            let path = if prefix.is_empty() {
                field.name().to_string()
            } else {
                format!("{}.{}", prefix, field.name())
            };
            field.validate_at(&path, obj.attribute(field.name()), opts, out);
        }

        if !opts.run_invariants || out.len() > start {
            return;
        }
        for (name, invariant) in &self.invariants {
            match contain(opts, || invariant(obj)) {
                Ok(()) => {}
                Err(e) if e.is::<StopValidation>() => break,
                Err(e) => out.push(Violation::new(
                    prefix,
                    ViolationKind::InvariantViolation,
                    format!("Invariant '{}' failed: {}", name, e),
                )),
            }
        }
    }

    /// Report changed fields that are read-only.
    ///
    /// `obj` is the object before the change. A read-only field may still be
    /// assigned while it holds no value; once set it may not change.
    pub fn check_readonly<A: Attributes>(&self, obj: &A, changed: &[&str]) -> ValidationReport {
        let mut violations = Vec::new();
        for name in changed {
            let Some(field) = self.field(name) else {
                debug!(schema = %self.name, field = %name, "ignoring change to unknown field");
                continue;
            };
            if !field.is_readonly() {
                continue;
            }
            let already_set = field.query(obj).map(|v| !field.is_missing(v)).unwrap_or(false);
            if already_set {
                violations.push(Violation::read_only(*name));
            }
        }
        ValidationReport::new(self.name.clone(), violations)
    }

    /// Resolved defaults for every field that has one
    pub fn defaults(&self) -> serde_json::Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|f| f.default_value().map(|v| (f.name().to_string(), v)))
            .collect()
    }

    fn resolve(
        name: String,
        title: Option<String>,
        description: Option<String>,
        bases: Vec<Arc<Schema>>,
        own_fields: Vec<Arc<Field>>,
        own_invariants: Vec<(String, Invariant)>,
    ) -> Schema {
        let mut fields: Vec<Arc<Field>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut invariants: Vec<(String, Invariant)> = Vec::new();

        for base in &bases {
            for field in &base.fields {
                if !index.contains_key(field.name()) {
                    index.insert(field.name().to_string(), fields.len());
                    fields.push(field.clone());
                }
            }
            for (inv_name, inv) in &base.invariants {
                if !invariants.iter().any(|(n, _)| n == inv_name) {
                    invariants.push((inv_name.clone(), inv.clone()));
                }
            }
        }

        for field in &own_fields {
            match index.get(field.name()) {
                Some(&i) => fields[i] = field.clone(),
                None => {
                    index.insert(field.name().to_string(), fields.len());
                    fields.push(field.clone());
                }
            }
        }

        for (inv_name, inv) in &own_invariants {
            match invariants.iter().position(|(n, _)| n == inv_name) {
                Some(i) => invariants[i] = (inv_name.clone(), inv.clone()),
                None => invariants.push((inv_name.clone(), inv.clone())),
            }
        }

        debug!(
            schema = %name,
            bases = bases.len(),
            own = own_fields.len(),
            resolved = fields.len(),
            "resolved schema fields"
        );

        Schema {
            name,
            title,
            description,
            bases,
            own_fields,
            own_invariants,
            fields,
            index,
            invariants,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("bases", &self.bases.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("fields", &self.names())
            .field("invariants", &self.invariant_names())
            .finish()
    }
}

/// Builder for [`Schema`]
pub struct SchemaBuilder {
    name: String,
    title: Option<String>,
    description: Option<String>,
    bases: Vec<Arc<Schema>>,
    fields: Vec<Field>,
    invariants: Vec<(String, Invariant)>,
}

impl SchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            bases: Vec::new(),
            fields: Vec::new(),
            invariants: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a base; earlier bases take precedence over later ones
    pub fn extends(mut self, base: impl Into<Arc<Schema>>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn invariant(
        mut self,
        name: impl Into<String>,
        check: impl Fn(&dyn Attributes) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.invariants.push((name.into(), Arc::new(check)));
        self
    }

    /// Build the schema, rejecting empty or duplicate field names
    pub fn build(self) -> Result<Schema> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name().is_empty() {
                return Err(SchemaError::InvalidField {
                    field: String::new(),
                    reason: format!("fields of schema {} must be named", self.name),
                });
            }
            if !seen.insert(field.name()) {
                return Err(SchemaError::DuplicateField {
                    schema: self.name.clone(),
                    field: field.name().to_string(),
                });
            }
        }

        let own_fields = self.fields.into_iter().map(Arc::new).collect();
        Ok(Schema::resolve(
            self.name,
            self.title,
            self.description,
            self.bases,
            own_fields,
            self.invariants,
        ))
    }
}
