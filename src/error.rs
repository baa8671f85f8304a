//! Error types for field and schema definitions

use thiserror::Error;

use crate::violation::Violation;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema definition and access errors
///
/// Value-level problems are never reported through this type; they end up as
/// [`Violation`]s inside a [`crate::ValidationReport`].
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Duplicate field '{field}' in schema {schema}")]
    DuplicateField { schema: String, field: String },

    #[error("Invalid field definition '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error(
        "Default for field '{field}' does not satisfy its constraints: {}",
        summarize(.violations)
    )]
    InvalidDefault { field: String, violations: Vec<Violation> },

    #[error("Unknown schema '{name}'{}", did_you_mean(.suggestion))]
    UnknownSchema { name: String, suggestion: Option<String> },

    #[error("Cyclic schema definition involving '{0}'")]
    CyclicDefinition(String),

    #[error("Invalid schema definition: {0}")]
    InvalidDefinition(String),

    #[error("Attribute '{0}' is not set")]
    AttributeMissing(String),

    #[error("Field '{0}' is read-only")]
    ReadOnly(String),

    #[error("Invalid value for field '{field}': {}", summarize(.violations))]
    InvalidValue { field: String, violations: Vec<Violation> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{}'?)", s))
        .unwrap_or_default()
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
