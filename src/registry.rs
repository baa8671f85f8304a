//! Schema Registry
//!
//! Builds schemas from declarative definitions and looks them up by name.
//! Definitions may reference each other (bases and object fields) in any
//! order; the registry orders them with a dependency graph before building.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::attributes::Attributes;
use crate::config::{FieldsConfig, RegistryConfig};
use crate::definition::{load_definitions, DefinitionFormat, SchemaDefinition};
use crate::error::{Result, SchemaError};
use crate::report::ValidationReport;
use crate::schema::Schema;
use crate::validation::ValidationOptions;

/// A fuzzy search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub title: Option<String>,
    pub score: i64,
}

/// Immutable set of named schemas
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Built schemas by name
    schemas: HashMap<String, Arc<Schema>>,
    /// Names in build (dependency) order
    order: Vec<String>,
    /// Definition file each schema came from, when loaded from disk
    sources: HashMap<String, PathBuf>,
}

impl SchemaRegistry {
    /// Build every definition, bases and referenced schemas first
    pub fn from_definitions(definitions: Vec<SchemaDefinition>) -> Result<Self> {
        let mut graph: DiGraph<String, ()> =
            DiGraph::with_capacity(definitions.len(), definitions.len());
        let mut nodes: HashMap<String, NodeIndex> = HashMap::with_capacity(definitions.len());

        for def in &definitions {
            if nodes.contains_key(&def.name) {
                return Err(SchemaError::InvalidDefinition(format!(
                    "schema '{}' is defined more than once",
                    def.name
                )));
            }
            let idx = graph.add_node(def.name.clone());
            nodes.insert(def.name.clone(), idx);
        }

        // Edges point from a dependency to the schema that needs it
        for def in &definitions {
            let target = nodes[&def.name];
            for dep in def.dependencies() {
                let source = *nodes.get(dep).ok_or_else(|| SchemaError::UnknownSchema {
                    name: dep.to_string(),
                    suggestion: suggest(dep, nodes.keys().map(String::as_str)),
                })?;
                graph.add_edge(source, target, ());
            }
        }

        let sorted = toposort(&graph, None)
            .map_err(|cycle| SchemaError::CyclicDefinition(graph[cycle.node_id()].clone()))?;

        let mut by_name: HashMap<String, SchemaDefinition> =
            definitions.into_iter().map(|d| (d.name.clone(), d)).collect();
        let mut schemas: HashMap<String, Arc<Schema>> = HashMap::with_capacity(by_name.len());
        let mut order = Vec::with_capacity(by_name.len());

        for idx in sorted {
            let name = &graph[idx];
            let Some(def) = by_name.remove(name) else { continue };
            let schema = {
                let lookup = |dep: &str| -> Result<Arc<Schema>> {
                    schemas.get(dep).cloned().ok_or_else(|| SchemaError::UnknownSchema {
                        name: dep.to_string(),
                        suggestion: None,
                    })
                };
                def.build(&lookup)?
            };
            debug!(schema = %name, fields = schema.len(), "built schema");
            schemas.insert(name.clone(), Arc::new(schema));
            order.push(name.clone());
        }

        Ok(Self {
            schemas,
            order,
            sources: HashMap::new(),
        })
    }

    /// Load every `.json` / `.toml` definition file under `dir`
    pub fn from_directory(dir: &Path, config: &RegistryConfig) -> Result<Self> {
        let mut definitions = Vec::new();
        let mut sources = HashMap::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || DefinitionFormat::from_path(path).is_none() {
                continue;
            }

            let relative = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            if config.skip_prefixes.iter().any(|p| relative.starts_with(p.as_str())) {
                debug!(path = %relative, "skipping definition file");
                continue;
            }

            for def in load_definitions(path)? {
                sources.insert(def.name.clone(), path.to_path_buf());
                definitions.push(def);
            }
        }

        let file_count = sources.values().collect::<std::collections::HashSet<_>>().len();
        let mut registry = Self::from_definitions(definitions)?;
        registry.sources = sources;

        info!(
            dir = %dir.display(),
            files = file_count,
            schemas = registry.len(),
            "loaded schema registry"
        );
        Ok(registry)
    }

    /// Load the directory named by the configuration
    pub fn from_config(config: &FieldsConfig) -> Result<Self> {
        Self::from_directory(&config.registry_path(), &config.registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    /// Like [`Self::get`], with a "did you mean" suggestion on a miss
    pub fn require(&self, name: &str) -> Result<Arc<Schema>> {
        self.get(name).ok_or_else(|| SchemaError::UnknownSchema {
            name: name.to_string(),
            suggestion: suggest(name, self.order.iter().map(String::as_str)),
        })
    }

    /// Schema names in dependency order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Definition file a schema was loaded from
    pub fn source(&self, name: &str) -> Option<&Path> {
        self.sources.get(name).map(PathBuf::as_path)
    }

    /// Validate `obj` against the schema called `name`
    pub fn validate<A: Attributes>(
        &self,
        name: &str,
        obj: &A,
        opts: &ValidationOptions,
    ) -> Result<ValidationReport> {
        Ok(self.require(name)?.validate_object_with(obj, opts))
    }

    /// Search schemas by name or title (fuzzy)
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, &Arc<Schema>)> = Vec::new();

        for name in &self.order {
            let schema = &self.schemas[name];
            let score = matcher
                .fuzzy_match(name, query)
                .into_iter()
                .chain(schema.title().and_then(|t| matcher.fuzzy_match(t, query)))
                .max();
            if let Some(score) = score {
                results.push((score, schema));
            }
        }

        // Sort by score descending
        results.sort_by(|a, b| b.0.cmp(&a.0));

        results
            .into_iter()
            .take(limit)
            .map(|(score, schema)| SearchResult {
                name: schema.name().to_string(),
                title: schema.title().map(str::to_string),
                score,
            })
            .collect()
    }
}

/// Best fuzzy match for `name` among `candidates`
fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    candidates
        .filter_map(|c| matcher.fuzzy_match(c, name).map(|score| (score, c)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, c)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::parse_definitions;
    use serde_json::json;

    fn defs(json: serde_json::Value) -> Vec<SchemaDefinition> {
        parse_definitions(&json.to_string(), DefinitionFormat::Json).unwrap()
    }

    #[test]
    fn test_definitions_in_any_order() {
        let registry = SchemaRegistry::from_definitions(defs(json!({
            "schemas": [
                {"name": "Person", "extends": ["Named"], "fields": [
                    {"name": "address", "type": "object", "schema": "Address"}
                ]},
                {"name": "Address", "fields": [{"name": "city", "type": "text_line"}]},
                {"name": "Named", "fields": [{"name": "name", "type": "text_line"}]}
            ]
        })))
        .unwrap();

        assert_eq!(registry.len(), 3);
        let person = registry.get("Person").unwrap();
        assert_eq!(person.names(), vec!["name", "address"]);
        assert!(person.is_or_extends("Named"));

        let pos = |n: &str| registry.names().iter().position(|x| x == n).unwrap();
        assert!(pos("Named") < pos("Person"));
        assert!(pos("Address") < pos("Person"));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = SchemaRegistry::from_definitions(defs(json!({
            "schemas": [
                {"name": "A", "extends": ["B"]},
                {"name": "B", "extends": ["A"]}
            ]
        })))
        .unwrap_err();
        assert!(matches!(err, SchemaError::CyclicDefinition(_)));
    }

    #[test]
    fn test_self_reference_rejected() {
        let err = SchemaRegistry::from_definitions(defs(json!({
            "name": "Node",
            "fields": [{"name": "next", "type": "object", "schema": "Node", "required": false}]
        })))
        .unwrap_err();
        assert!(matches!(err, SchemaError::CyclicDefinition(_)));
    }

    #[test]
    fn test_unknown_reference_suggests_name() {
        let err = SchemaRegistry::from_definitions(defs(json!({
            "schemas": [
                {"name": "Address"},
                {"name": "Person", "fields": [
                    {"name": "home", "type": "object", "schema": "Adress"}
                ]}
            ]
        })))
        .unwrap_err();
        match err {
            SchemaError::UnknownSchema { name, suggestion } => {
                assert_eq!(name, "Adress");
                assert_eq!(suggestion.as_deref(), Some("Address"));
            }
            other => panic!("Expected UnknownSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let err = SchemaRegistry::from_definitions(defs(json!({
            "schemas": [{"name": "A"}, {"name": "A"}]
        })))
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefinition(_)));
    }

    #[test]
    fn test_search() {
        let registry = SchemaRegistry::from_definitions(defs(json!({
            "schemas": [
                {"name": "PostalAddress", "title": "Postal address"},
                {"name": "Person"},
                {"name": "Invoice"}
            ]
        })))
        .unwrap();

        let hits = registry.search("addr", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "PostalAddress");

        let err = registry.require("Persn").unwrap_err();
        assert!(err.to_string().contains("did you mean 'Person'"), "{}", err);
    }
}
