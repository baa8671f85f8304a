//! Fields Config CLI
//!
//! Inspect the configuration and the schema registry it points at.

use clap::{Parser, Subcommand};
use field_schemas::{FieldsConfig, SchemaRegistry};

#[derive(Parser)]
#[command(name = "schema-config")]
#[command(about = "Inspect field-schemas configuration and its registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Show {
        /// Config file to load (optional)
        #[arg(short, long)]
        config: Option<String>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Init {
        /// Output path (default: fields.toml)
        #[arg(short, long, default_value = "fields.toml")]
        output: String,

        /// Registry directory to record in the new file
        #[arg(short, long)]
        registry: Option<String>,
    },

    /// Check the configuration and load every schema it points at
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        config: Option<String>,

        /// Only parse the configuration, skip loading the registry
        #[arg(long)]
        no_registry: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let cfg = FieldsConfig::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&cfg)?);
            } else {
                let resolved = cfg.registry_path();
                println!("📋 Field Schemas Configuration\n");
                println!("Registry:");
                println!("  Path: {}", cfg.registry.path.display());
                println!(
                    "  Resolved: {} ({})",
                    resolved.display(),
                    if resolved.is_dir() { "found" } else { "missing" }
                );
                println!("  Skip prefixes: {:?}", cfg.registry.skip_prefixes);

                println!("\nValidation:");
                println!("  Catch hook panics: {}", cfg.validation.catch_hook_panics);
                println!("  Run invariants: {}", cfg.validation.run_invariants);

                println!("\nLogging:");
                println!("  Filter: {}", cfg.logging.filter);
            }
        }

        Commands::Init { output, registry } => {
            let mut cfg = FieldsConfig::default();
            if let Some(path) = registry {
                cfg.registry.path = path.into();
            }
            cfg.save(&output)?;
            println!("✅ Created config file: {}", output);
            println!("   Registry: {}", cfg.registry.path.display());
        }

        Commands::Validate { config, no_registry } => {
            let cfg = match FieldsConfig::load_from(config.as_deref()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("❌ Configuration error: {}", e);
                    std::process::exit(1);
                }
            };
            println!("✅ Configuration is valid");

            if no_registry {
                return Ok(());
            }

            let resolved = cfg.registry_path();
            match SchemaRegistry::from_config(&cfg) {
                Ok(registry) => {
                    println!(
                        "✅ Registry {} loaded: {} schemas",
                        resolved.display(),
                        registry.len()
                    );
                    for name in registry.names() {
                        let source = registry
                            .source(name)
                            .map(|p| p.display().to_string())
                            .unwrap_or_default();
                        println!("   {} ({})", name, source);
                    }
                }
                Err(e) => {
                    eprintln!("❌ Registry {} failed to load: {}", resolved.display(), e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
