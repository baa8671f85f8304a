//! Configuration management
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (fields.toml)
//! - Environment variables (FIELDS_*)
//!
//! ## Example config file (fields.toml):
//! ```toml
//! [registry]
//! path = "./schemas"
//! skip_prefixes = ["drafts/"]
//!
//! [validation]
//! catch_hook_panics = true
//! run_invariants = true
//!
//! [logging]
//! filter = "field_schemas=debug"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::validation::ValidationOptions;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldsConfig {
    /// Where schema definitions are loaded from
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Validation pass options
    #[serde(default)]
    pub validation: ValidationOptions,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding `.json` / `.toml` schema definitions
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Skip definition files whose relative path starts with one of these
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_registry_path() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_skip_prefixes() -> Vec<String> {
    vec![
        "target/".to_string(),
        ".git/".to_string(),
    ]
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl FieldsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "fields.toml",
            ".fields.toml",
            "config/fields.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "fields") {
            let xdg_config = config_dir.config_dir().join("fields.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (FIELDS_*)
        builder = builder.add_source(
            Environment::with_prefix("FIELDS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the registry path (resolves relative paths)
    pub fn registry_path(&self) -> PathBuf {
        if self.registry.path.is_absolute() {
            self.registry.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FieldsConfig::default();
        assert!(config.validation.catch_hook_panics);
        assert!(config.validation.run_invariants);
        assert_eq!(config.registry.path, PathBuf::from("schemas"));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_serialize_config() {
        let config = FieldsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[registry]\npath = \"/srv/schemas\"\n\n[validation]\nrun_invariants = false\n",
        )
        .unwrap();

        let config = FieldsConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.registry.path, PathBuf::from("/srv/schemas"));
        assert!(!config.validation.run_invariants);
        assert!(config.validation.catch_hook_panics);
        assert_eq!(config.registry_path(), PathBuf::from("/srv/schemas"));
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = FieldsConfig::default();
        config.logging.filter = "debug".to_string();
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = FieldsConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.logging.filter, "debug");
    }
}
