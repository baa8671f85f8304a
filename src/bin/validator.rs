//! Schema Validator CLI
//!
//! Validates JSON documents against schemas from a definitions directory.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use field_schemas::{FieldsConfig, SchemaRegistry, ValidationReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-validator")]
#[command(about = "Validate JSON documents against field schemas")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<String>,

    /// Schema definitions directory (overrides the configured path)
    #[arg(short, long)]
    schemas: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate documents against a schema
    Check {
        /// Schema name
        schema: String,
        /// JSON documents to validate
        #[arg(required = true)]
        documents: Vec<PathBuf>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a change set for read-only fields
    Readonly {
        /// Schema name
        schema: String,
        /// The document before the change
        before: PathBuf,
        /// Names of the changed fields
        #[arg(short = 'f', long = "field", required = true)]
        changed: Vec<String>,
    },

    /// List registered schemas and their fields
    List,

    /// Search schemas by name or title
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn read_json(path: &PathBuf) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_report(path: &PathBuf, report: &ValidationReport) {
    if report.is_valid() {
        println!("✅ {} - valid against {}", path.display(), report.schema);
    } else {
        println!(
            "❌ {} - {} violation(s) against {}",
            path.display(),
            report.len(),
            report.schema
        );
        for v in report.violations() {
            println!("   └─ {} [{}] {}", v.field, v.kind, v.message);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = FieldsConfig::load_from(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    let registry = match &cli.schemas {
        Some(dir) => SchemaRegistry::from_directory(dir, &config.registry)?,
        None => SchemaRegistry::from_config(&config)?,
    };

    match cli.command {
        Commands::Check { schema, documents, json } => {
            let mut all_valid = true;
            let mut reports = Vec::with_capacity(documents.len());

            for path in &documents {
                let doc = read_json(path)?;
                let report = registry.validate(&schema, &doc, &config.validation)?;
                all_valid &= report.is_valid();
                if !json {
                    print_report(path, &report);
                }
                reports.push(serde_json::json!({
                    "document": path.display().to_string(),
                    "report": report,
                }));
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
            if !all_valid {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Readonly { schema, before, changed } => {
            let doc = read_json(&before)?;
            let changed: Vec<&str> = changed.iter().map(String::as_str).collect();
            let report = registry.require(&schema)?.check_readonly(&doc, &changed);
            print_report(&before, &report);
            if !report.is_valid() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::List => {
            println!("📋 {} schema(s)", registry.len());
            for name in registry.names() {
                let schema = registry.require(name)?;
                let source = registry
                    .source(name)
                    .map(|p| format!(" ({})", p.display()))
                    .unwrap_or_default();
                println!("\n{}{}", name, source);
                for field in schema.fields() {
                    let mut flags = Vec::new();
                    if field.is_required() {
                        flags.push("required");
                    }
                    if field.is_readonly() {
                        flags.push("readonly");
                    }
                    println!("  - {}: {} {:?}", field.name(), field.kind(), flags);
                }
            }
            Ok(())
        }

        Commands::Search { query, limit } => {
            let results = registry.search(&query, limit);
            if results.is_empty() {
                println!("No schemas match '{}'", query);
            }
            for hit in results {
                match hit.title {
                    Some(title) => println!("{} - {} (score {})", hit.name, title, hit.score),
                    None => println!("{} (score {})", hit.name, hit.score),
                }
            }
            Ok(())
        }
    }
}
