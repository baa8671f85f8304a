//! Registry tests against the definition fixtures
//!
//! Loads `tests/fixtures/schemas` (JSON and TOML, with cross-file bases and
//! object references) and validates the documents under
//! `tests/fixtures/documents`.

use std::path::{Path, PathBuf};

use field_schemas::config::RegistryConfig;
use field_schemas::{
    Constraint, FieldsConfig, SchemaError, SchemaRegistry, ValidationOptions, ViolationKind,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn registry_config() -> RegistryConfig {
    RegistryConfig {
        path: fixtures_path().join("schemas"),
        skip_prefixes: vec!["drafts/".to_string()],
    }
}

fn load_registry() -> SchemaRegistry {
    SchemaRegistry::from_directory(&fixtures_path().join("schemas"), &registry_config()).unwrap()
}

fn document(name: &str) -> serde_json::Value {
    let path = fixtures_path().join("documents").join(name);
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_fixture_directory() {
    let registry = load_registry();

    assert_eq!(registry.len(), 3);
    assert!(registry.get("Broken").is_none());

    let person = registry.get("Person").unwrap();
    assert_eq!(
        person.names(),
        vec!["name", "id", "age", "email", "tags", "created", "home"]
    );
    assert!(person.is_or_extends("Named"));
    assert_eq!(person.title(), Some("Person record"));

    let source = registry.source("Person").unwrap();
    assert!(source.ends_with("person.toml"));
    assert!(registry.source("Address").unwrap().ends_with("contact.json"));
}

#[test]
fn test_skipped_prefix_is_required_to_load() {
    let config = RegistryConfig {
        skip_prefixes: Vec::new(),
        ..registry_config()
    };
    let err = SchemaRegistry::from_directory(&config.path, &config).unwrap_err();
    match err {
        SchemaError::UnknownSchema { name, .. } => assert_eq!(name, "DoesNotExist"),
        other => panic!("Expected UnknownSchema, got {:?}", other),
    }
}

#[test]
fn test_from_config_uses_registry_path() {
    let config = FieldsConfig {
        registry: registry_config(),
        ..FieldsConfig::default()
    };
    let registry = SchemaRegistry::from_config(&config).unwrap();
    assert_eq!(registry.names().len(), 3);
}

#[test]
fn test_saved_config_loads_its_registry() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("fields.toml");

    let config = FieldsConfig {
        registry: registry_config(),
        ..FieldsConfig::default()
    };
    config.save(config_path.to_str().unwrap()).unwrap();

    let loaded = FieldsConfig::load_from(config_path.to_str()).unwrap();
    assert_eq!(loaded.registry_path(), fixtures_path().join("schemas"));
    assert!(loaded.registry_path().is_dir());

    let registry = SchemaRegistry::from_config(&loaded).unwrap();
    assert_eq!(registry.len(), 3);
    assert!(registry.source("Named").unwrap().ends_with("contact.json"));
}

#[test]
fn test_config_with_missing_registry_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = FieldsConfig {
        registry: RegistryConfig {
            path: dir.path().join("absent"),
            skip_prefixes: Vec::new(),
        },
        ..FieldsConfig::default()
    };
    assert!(!config.registry_path().is_dir());
    assert!(SchemaRegistry::from_config(&config).is_err());
}

#[test]
fn test_load_from_temp_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("b.json"),
        r#"{"name": "Child", "extends": ["Base"], "fields": [{"name": "b", "type": "bool"}]}"#,
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(
        dir.path().join("nested/a.toml"),
        "name = \"Base\"\n\n[[fields]]\nname = \"a\"\ntype = \"int\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.md"), "not a definition").unwrap();

    let registry = SchemaRegistry::from_directory(dir.path(), &RegistryConfig::default()).unwrap();
    assert_eq!(registry.names(), &["Base".to_string(), "Child".to_string()]);
    assert_eq!(registry.require("Child").unwrap().names(), vec!["a", "b"]);
}

#[test]
fn test_malformed_definition_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.json"), "{\"name\": ").unwrap();

    let err = SchemaRegistry::from_directory(dir.path(), &RegistryConfig::default()).unwrap_err();
    match err {
        SchemaError::InvalidDefinition(msg) => assert!(msg.contains("bad.json"), "{}", msg),
        other => panic!("Expected InvalidDefinition, got {:?}", other),
    }
}

// =============================================================================
// Validation through the registry
// =============================================================================

#[test]
fn test_valid_document() {
    let registry = load_registry();
    let report = registry
        .validate("Person", &document("person_valid.json"), &ValidationOptions::default())
        .unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn test_invalid_document_reports_everything() {
    let registry = load_registry();
    let report = registry
        .validate("Person", &document("person_invalid.json"), &ValidationOptions::default())
        .unwrap();

    let found: Vec<(&str, ViolationKind)> = report
        .violations()
        .iter()
        .map(|v| (v.field.as_str(), v.kind))
        .collect();

    assert_eq!(
        found,
        vec![
            ("name", ViolationKind::MissingValue),
            ("id", ViolationKind::ConstraintViolation(Constraint::PatternMismatch)),
            ("age", ViolationKind::ConstraintViolation(Constraint::TooSmall)),
            ("email", ViolationKind::ConstraintViolation(Constraint::PatternMismatch)),
            ("tags[1]", ViolationKind::ConstraintViolation(Constraint::NotUnique)),
            ("tags[2]", ViolationKind::ConstraintViolation(Constraint::TooLong)),
            ("created", ViolationKind::ConstraintViolation(Constraint::TooSmall)),
            ("home.city", ViolationKind::MissingValue),
            ("home.country", ViolationKind::NotInChoices),
        ]
    );
    assert_eq!(report.for_field("tags").count(), 2);
    assert_eq!(report.for_field("home").count(), 2);
}

#[test]
fn test_readonly_through_registry() {
    let registry = load_registry();
    let person = registry.require("Person").unwrap();
    let before = document("person_valid.json");

    let report = person.check_readonly(&before, &["id", "age"]);
    assert_eq!(report.len(), 1);
    assert_eq!(report.violations[0].field, "id");
}

#[test]
fn test_unknown_schema_suggestion() {
    let registry = load_registry();
    let err = registry
        .validate("Persn", &document("person_valid.json"), &ValidationOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("Person"), "{}", err);
}

#[test]
fn test_search_by_title() {
    let registry = load_registry();
    let hits = registry.search("postal", 5);
    assert_eq!(hits.first().map(|h| h.name.as_str()), Some("Address"));
}
