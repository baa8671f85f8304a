//! Typed, constrained attribute descriptors
//!
//! A [`Field`] describes one named attribute: its kind, whether it is
//! required or read-only, its default, and the constraints a value must
//! satisfy. Fields are built once through [`FieldBuilder`] and are immutable
//! afterwards.
//!
//! ## Validation order
//!
//! 1. missing values (absent, or equal to the field's missing value)
//! 2. type check (a mismatch stops validation of that value)
//! 3. kind constraints: ranges, lengths, choices, patterns, elements
//! 4. the constraint predicate
//! 5. validation hooks, in registration order; a hook returning
//!    [`StopValidation`] ends the chain without a violation

pub mod kind;

pub use kind::{CollectionRules, DictRules, FieldKind, TextRules};

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use crate::attributes::{Attributes, AttributesMut};
use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::validation::ValidationOptions;
use crate::violation::{Constraint, Violation};

use kind::parse_datetime;

/// Constraint predicate: `false` means the value is rejected
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Custom validation hook, run after every other check
pub type Hook = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Produces a default value on demand
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Returned by a hook or invariant to end validation early, as a success
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("validation stopped")]
pub struct StopValidation;

/// Key of the marker object sent for a password the user left unchanged
pub const UNCHANGED_PASSWORD_KEY: &str = "$unchanged_password";

/// The "password unchanged" marker accepted by password fields
pub fn unchanged_password() -> Value {
    let mut marker = Map::new();
    marker.insert(UNCHANGED_PASSWORD_KEY.to_string(), Value::Bool(true));
    Value::Object(marker)
}

/// A named, typed, constrained attribute descriptor
#[derive(Clone)]
pub struct Field {
    name: String,
    title: String,
    description: String,
    required: bool,
    readonly: bool,
    default: Option<Value>,
    default_factory: Option<DefaultFactory>,
    missing_value: Value,
    kind: FieldKind,
    constraint: Option<Predicate>,
    hooks: Vec<Hook>,
}

impl Field {
    pub fn text(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Text { single_line: false, password: false })
    }

    /// Text without line breaks
    pub fn text_line(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Text { single_line: true, password: false })
    }

    /// Single-line secret text.
    ///
    /// Accepts [`unchanged_password`] in place of a value when the bound
    /// object already holds a password; writing the marker is a no-op.
    pub fn password(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Text { single_line: true, password: true })
    }

    pub fn bool(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Bool)
    }

    pub fn int(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Int)
    }

    pub fn float(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Float)
    }

    /// RFC 3339 timestamp
    pub fn datetime(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Datetime)
    }

    /// One of a fixed set of values
    pub fn choice<I, V>(name: impl Into<String>, values: I) -> FieldBuilder
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        FieldBuilder::new(name, PendingKind::Choice(values))
    }

    /// Array whose elements are validated against `element`
    pub fn list(name: impl Into<String>, element: Field) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::List(Box::new(element)))
    }

    /// Array of unique elements validated against `element`
    pub fn set(name: impl Into<String>, element: Field) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Set(Box::new(element)))
    }

    /// Object whose keys and values are validated against `key` and `value`
    pub fn dict(name: impl Into<String>, key: Field, value: Field) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Dict(Box::new(key), Box::new(value)))
    }

    /// Nested object validated against `schema`
    pub fn object(name: impl Into<String>, schema: impl Into<Arc<Schema>>) -> FieldBuilder {
        FieldBuilder::new(name, PendingKind::Object(schema.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Title and description joined as a doc string
    pub fn doc(&self) -> String {
        match (self.title.is_empty(), self.description.is_empty()) {
            (false, false) => format!("{}\n\n{}", self.title, self.description),
            (false, true) => self.title.clone(),
            (true, false) => self.description.clone(),
            (true, true) => String::new(),
        }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn missing_value(&self) -> &Value {
        &self.missing_value
    }

    /// The default value, from the static default or the factory.
    ///
    /// A default equal to the missing value counts as no default.
    pub fn default_value(&self) -> Option<Value> {
        let value = match (&self.default, &self.default_factory) {
            (Some(v), _) => Some(v.clone()),
            (None, Some(factory)) => Some(factory()),
            (None, None) => None,
        };
        value.filter(|v| !self.is_missing(v))
    }

    /// Whether `value` stands for "no value" in this field
    pub fn is_missing(&self, value: &Value) -> bool {
        *value == self.missing_value
    }

    pub fn is_password(&self) -> bool {
        matches!(&self.kind, FieldKind::Text(rules) if rules.password)
    }

    fn is_unchanged_password(&self, value: &Value) -> bool {
        self.is_password() && *value == unchanged_password()
    }

    /// Validate a single value; `None` means the attribute is absent
    pub fn validate(&self, value: Option<&Value>) -> Vec<Violation> {
        self.validate_with(value, &ValidationOptions::default())
    }

    pub fn validate_with(&self, value: Option<&Value>, opts: &ValidationOptions) -> Vec<Violation> {
        let mut out = Vec::new();
        self.validate_at(&self.name, value, opts, &mut out);
        out
    }

    /// Validate `value` and append violations under `path`
    pub(crate) fn validate_at(
        &self,
        path: &str,
        value: Option<&Value>,
        opts: &ValidationOptions,
        out: &mut Vec<Violation>,
    ) {
        let value = match value {
            Some(v) if !self.is_missing(v) => v,
            _ => {
                if self.required && self.default_value().is_none() {
                    out.push(Violation::missing(path));
                }
                return;
            }
        };

        if let Err(violation) = self.kind.check_type(path, value) {
            out.push(violation);
            return;
        }

        self.kind.check_constraints(path, value, opts, out);

        if let Some(predicate) = &self.constraint {
            match contain(opts, || Ok(predicate(value))) {
                Ok(true) => {}
                Ok(false) => out.push(Violation::constraint(path, Constraint::Predicate)),
                Err(reason) => {
                    out.push(Violation::constraint_with(path, Constraint::Predicate, reason))
                }
            }
        }

        for hook in &self.hooks {
            match contain(opts, || hook(value)) {
                Ok(()) => {}
                Err(e) if e.is::<StopValidation>() => break,
                Err(reason) => {
                    warn!(field = %path, %reason, "validation hook rejected value");
                    out.push(Violation::constraint_with(path, Constraint::Hook, reason));
                }
            }
        }
    }

    /// Validate `value` as a new value for this field on `obj`.
    ///
    /// Same as [`Field::validate`], except that a password field accepts
    /// [`unchanged_password`] when `obj` already holds a password.
    pub fn validate_bound<A: Attributes>(&self, obj: &A, value: Option<&Value>) -> Vec<Violation> {
        if let Some(v) = value {
            let already_set = self.query(obj).map_or(false, |current| !self.is_missing(current));
            if already_set && self.is_unchanged_password(v) {
                return Vec::new();
            }
        }
        self.validate(value)
    }

    /// Parse `text` into a value of this field's kind and validate it
    pub fn from_text(&self, text: &str) -> Result<Value> {
        let value = self.kind.parse_text(text).ok_or_else(|| SchemaError::InvalidValue {
            field: self.name.clone(),
            violations: vec![Violation::wrong_type(
                self.name.as_str(),
                self.kind.type_name(),
                "text",
            )],
        })?;

        let violations = self.validate(Some(&value));
        if violations.is_empty() {
            Ok(value)
        } else {
            Err(SchemaError::InvalidValue {
                field: self.name.clone(),
                violations,
            })
        }
    }

    /// Read this field's attribute from `obj`
    pub fn get<'a, A: Attributes>(&self, obj: &'a A) -> Result<&'a Value> {
        obj.attribute(&self.name)
            .ok_or_else(|| SchemaError::AttributeMissing(self.name.clone()))
    }

    pub fn query<'a, A: Attributes>(&self, obj: &'a A) -> Option<&'a Value> {
        obj.attribute(&self.name)
    }

    pub fn query_or<A: Attributes>(&self, obj: &A, default: Value) -> Value {
        self.query(obj).cloned().unwrap_or(default)
    }

    /// Write this field's attribute on `obj`.
    ///
    /// The value is not validated. Integers written to a bool field are
    /// stored as booleans. The unchanged-password marker is never written.
    pub fn set_value<A: AttributesMut>(&self, obj: &mut A, value: Value) -> Result<()> {
        if self.is_unchanged_password(&value) {
            return Ok(());
        }
        if self.readonly {
            return Err(SchemaError::ReadOnly(self.name.clone()));
        }
        let value = match (&self.kind, value) {
            (FieldKind::Bool, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Value::Bool(n.as_f64() != Some(0.0))
            }
            (_, value) => value,
        };
        obj.set_attribute(&self.name, value);
        Ok(())
    }

    /// Validate `value` against this field bound to `obj`, then write it.
    ///
    /// The missing value is written without validation. On failure `obj` is
    /// left untouched.
    pub fn set_validated<A: AttributesMut>(&self, obj: &mut A, value: Value) -> Result<()> {
        if !self.is_missing(&value) {
            let violations = self.validate_bound(&*obj, Some(&value));
            if !violations.is_empty() {
                return Err(SchemaError::InvalidValue {
                    field: self.name.clone(),
                    violations,
                });
            }
        }
        self.set_value(obj, value)
    }

    /// A copy of this field under another name
    pub fn renamed(&self, name: impl Into<String>) -> Field {
        Field {
            name: name.into(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind.type_name())
            .field("required", &self.required)
            .field("readonly", &self.readonly)
            .field("default", &self.default)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

/// Run user code, turning panics into errors when enabled
pub(crate) fn contain<T>(
    opts: &ValidationOptions,
    f: impl FnOnce() -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    if !opts.catch_hook_panics {
        return f();
    }
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow::anyhow!("panicked: {}", msg))
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

#[derive(Debug)]
enum PendingKind {
    Text { single_line: bool, password: bool },
    Bool,
    Int,
    Float,
    Datetime,
    Choice(Vec<Value>),
    List(Box<Field>),
    Set(Box<Field>),
    Dict(Box<Field>, Box<Field>),
    Object(Arc<Schema>),
}

/// Builder for [`Field`]
///
/// Kind-specific options (`min`, `max_length`, `pattern`, ...) are checked
/// against the kind in [`FieldBuilder::build`].
pub struct FieldBuilder {
    name: String,
    kind: PendingKind,
    title: String,
    description: String,
    required: bool,
    readonly: bool,
    default: Option<Value>,
    default_factory: Option<DefaultFactory>,
    missing_value: Value,
    min: Option<Value>,
    max: Option<Value>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
    unique: Option<bool>,
    constraint: Option<Predicate>,
    hooks: Vec<Hook>,
}

impl FieldBuilder {
    fn new(name: impl Into<String>, kind: PendingKind) -> Self {
        Self {
            name: name.into(),
            kind,
            title: String::new(),
            description: String::new(),
            required: true,
            readonly: false,
            default: None,
            default_factory: None,
            missing_value: Value::Null,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            unique: None,
            constraint: None,
            hooks: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn default_factory(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default_factory = Some(Arc::new(factory));
        self
    }

    /// Value that stands for "no value" (JSON `null` unless set)
    pub fn missing_value(mut self, value: impl Into<Value>) -> Self {
        self.missing_value = value.into();
        self
    }

    /// Inclusive minimum (int, float, datetime)
    pub fn min(mut self, value: impl Into<Value>) -> Self {
        self.min = Some(value.into());
        self
    }

    /// Inclusive maximum (int, float, datetime)
    pub fn max(mut self, value: impl Into<Value>) -> Self {
        self.max = Some(value.into());
        self
    }

    /// Inclusive minimum length (text, list, set, dict)
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Inclusive maximum length (text, list, set, dict)
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Regex the whole text must match (text)
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Reject duplicate elements (list; sets are always unique)
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    pub fn constraint(
        mut self,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.constraint = Some(Arc::new(predicate));
        self
    }

    pub fn hook(
        mut self,
        hook: impl Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Build the field, checking its configuration and its default
    pub fn build(self) -> Result<Field> {
        let kind = self.resolve_kind()?;

        let field = Field {
            name: self.name,
            title: self.title,
            description: self.description,
            required: self.required,
            readonly: self.readonly,
            default: self.default,
            default_factory: self.default_factory,
            missing_value: self.missing_value,
            kind,
            constraint: self.constraint,
            hooks: self.hooks,
        };

        if let Some(default) = field.default_value() {
            let violations = field.validate(Some(&default));
            if !violations.is_empty() {
                return Err(SchemaError::InvalidDefault {
                    field: field.name,
                    violations,
                });
            }
        }

        Ok(field)
    }

    fn resolve_kind(&self) -> Result<FieldKind> {
        let ordered = matches!(
            self.kind,
            PendingKind::Int | PendingKind::Float | PendingKind::Datetime
        );
        let sized = matches!(
            self.kind,
            PendingKind::Text { .. }
                | PendingKind::List(_)
                | PendingKind::Set(_)
                | PendingKind::Dict(..)
        );

        if !ordered && (self.min.is_some() || self.max.is_some()) {
            return Err(self.invalid("min/max only apply to int, float and datetime fields"));
        }
        if !sized && (self.min_length.is_some() || self.max_length.is_some()) {
            return Err(self.invalid(
                "min_length/max_length only apply to text, list, set and dict fields",
            ));
        }
        if self.pattern.is_some() && !matches!(self.kind, PendingKind::Text { .. }) {
            return Err(self.invalid("pattern only applies to text fields"));
        }
        match (&self.kind, self.unique) {
            (_, None) | (PendingKind::List(_), Some(_)) | (PendingKind::Set(_), Some(true)) => {}
            (PendingKind::Set(_), Some(false)) => {
                return Err(self.invalid("set elements are always unique"));
            }
            (_, Some(_)) => return Err(self.invalid("unique only applies to list and set fields")),
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(self.invalid(format!("min_length {} exceeds max_length {}", min, max)));
            }
        }

        let kind = match &self.kind {
            PendingKind::Text { single_line, password } => {
                let pattern = match &self.pattern {
                    Some(p) => Some(
                        Regex::new(&format!("^(?:{})$", p))
                            .map_err(|e| self.invalid(format!("bad pattern: {}", e)))?,
                    ),
                    None => None,
                };
                FieldKind::Text(TextRules {
                    min_length: self.min_length,
                    max_length: self.max_length,
                    single_line: *single_line,
                    password: *password,
                    pattern,
                })
            }
            PendingKind::Bool => FieldKind::Bool,
            PendingKind::Int => {
                let min = self.bound(&self.min, Value::as_i64)?;
                let max = self.bound(&self.max, Value::as_i64)?;
                self.check_order(min, max)?;
                FieldKind::Int { min, max }
            }
            PendingKind::Float => {
                let min = self.bound(&self.min, Value::as_f64)?;
                let max = self.bound(&self.max, Value::as_f64)?;
                self.check_order(min, max)?;
                FieldKind::Float { min, max }
            }
            PendingKind::Datetime => {
                let min = self.bound(&self.min, |v| v.as_str().and_then(parse_datetime))?;
                let max = self.bound(&self.max, |v| v.as_str().and_then(parse_datetime))?;
                self.check_order(min, max)?;
                FieldKind::Datetime { min, max }
            }
            PendingKind::Choice(values) => {
                if values.is_empty() {
                    return Err(self.invalid("choice field needs at least one value"));
                }
                FieldKind::Choice { values: values.clone() }
            }
            PendingKind::List(element) => FieldKind::List(CollectionRules {
                element: element.clone(),
                min_length: self.min_length,
                max_length: self.max_length,
                unique: self.unique.unwrap_or(false),
            }),
            PendingKind::Set(element) => FieldKind::Set(CollectionRules {
                element: element.clone(),
                min_length: self.min_length,
                max_length: self.max_length,
                unique: true,
            }),
            PendingKind::Dict(key, value) => {
                if !matches!(key.kind, FieldKind::Text(_) | FieldKind::Choice { .. }) {
                    return Err(self.invalid("dict keys must be text or choice fields"));
                }
                FieldKind::Dict(DictRules {
                    key: key.clone(),
                    value: value.clone(),
                    min_length: self.min_length,
                    max_length: self.max_length,
                })
            }
            PendingKind::Object(schema) => FieldKind::Object { schema: schema.clone() },
        };

        Ok(kind)
    }

    fn bound<T>(
        &self,
        value: &Option<Value>,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match value {
            None => Ok(None),
            Some(v) => convert(v).map(Some).ok_or_else(|| {
                self.invalid(format!("bound {} is not a valid {} value", v, self.kind_name()))
            }),
        }
    }

    fn check_order<T: PartialOrd>(&self, min: Option<T>, max: Option<T>) -> Result<()> {
        match (min, max) {
            (Some(min), Some(max)) if min > max => Err(self.invalid("min exceeds max")),
            _ => Ok(()),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            PendingKind::Int => "int",
            PendingKind::Float => "float",
            PendingKind::Datetime => "datetime",
            _ => "bound",
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidField {
            field: self.name.clone(),
            reason: reason.into(),
        }
    }
}
