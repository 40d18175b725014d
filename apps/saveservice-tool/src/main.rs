//! CLI tool for the save service.
//!
//! Provides commands for:
//! - Definition checksums and initialization reports
//! - Auditing aliased types against a list of known types
//! - Re-saving test plans and result logs in the current format

mod cli;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use saveservice_core::catalog::TypeCatalog;
use saveservice_core::converter::{HTTP_SAMPLE_RESULT_TYPE, SAMPLE_RESULT_TYPE};
use saveservice_core::definitions::{DefinitionEntry, DefinitionSource};
use saveservice_core::integrity::checksum_file;
use saveservice_core::migration::MigrationTable;
use saveservice_core::{RecordContext, SaveService, SaveServiceConfig, Value};

use cli::{Cli, Commands, ServiceArgs};

fn load_config(args: &ServiceArgs) -> Result<SaveServiceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config '{}'", path.display()))?
        }
        None => SaveServiceConfig::default(),
    };
    if let Some(home) = &args.home {
        config.home = home.clone();
    }
    if let Some(definitions) = &args.definitions {
        config.definitions_file = definitions.clone();
    }
    if args.skip_checksum {
        config.expected_checksum = None;
    }
    Ok(config)
}

/// Catalog of decodable types.
///
/// With a type list only the listed types are known. Without one every type
/// the definitions alias is trusted.
fn build_catalog(args: &ServiceArgs, config: &SaveServiceConfig) -> Result<TypeCatalog> {
    let mut catalog = TypeCatalog::with_builtin_types();
    catalog.register_custom(SAMPLE_RESULT_TYPE)?;
    catalog.register_custom(HTTP_SAMPLE_RESULT_TYPE)?;

    match &args.types {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read type list '{}'", path.display()))?;
            catalog.register_all(
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#')),
            );
        }
        None => {
            let source = DefinitionSource::from_file(&config.definitions_path())?;
            let type_ids: Vec<String> = source
                .classified()
                .filter_map(|entry| match entry {
                    DefinitionEntry::Alias { type_id, .. } => Some(type_id),
                    _ => None,
                })
                .collect();
            catalog.register_all(type_ids.iter().map(String::as_str));
        }
    }
    Ok(catalog)
}

fn load_service(args: &ServiceArgs) -> Result<SaveService> {
    let config = load_config(args)?;
    let catalog = build_catalog(args, &config)?;

    let mut builder = SaveService::builder(config).catalog(catalog);
    if let Some(path) = &args.upgrade {
        builder = builder.migrator(Arc::new(MigrationTable::from_file(path)?));
    }
    Ok(builder.load()?)
}

fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Checksum { file } => {
            let path = match file {
                Some(path) => path,
                None => load_config(&cli.service)?.definitions_path(),
            };
            println!("{}", checksum_file(&path)?);
        }
        Commands::Report => {
            let service = load_service(&cli.service)?;
            println!("{}", service.report().to_json()?);
        }
        Commands::Audit => {
            let service = load_service(&cli.service)?;
            let missing = service.audit_registered_types();
            println!("{}", serde_json::to_string_pretty(&missing)?);
            if !missing.is_empty() {
                bail!("{} aliased types are not known", missing.len());
            }
        }
        Commands::Resolve { name } => {
            let service = load_service(&cli.service)?;
            let type_id = service.alias_to_type(&name);
            let report = serde_json::json!({
                "name": name,
                "type": type_id,
                "alias": service.type_to_alias(type_id),
                "decodable": service.marshaller().mapper().real_type(&name).is_some(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Resave { input, output } => {
            let service = load_service(&cli.service)?;
            let tree = service.load_document_file(&input)?;
            tracing::info!(
                "Loaded {} elements from {}",
                tree.element_count(),
                input.display()
            );
            let mut sink = open_output(output.as_deref())?;
            service.save_document(&tree, &mut sink)?;
        }
        Commands::ResaveRecords {
            input,
            output,
            wrap,
        } => {
            let service = load_service(&cli.service)?;
            let file = File::open(&input)
                .with_context(|| format!("Failed to open '{}'", input.display()))?;
            let mut records: Vec<Value> = Vec::new();
            let count = service.load_records(file, &mut records)?;
            tracing::info!("Loaded {} records from {}", count, input.display());

            let mut sink = open_output(output.as_deref())?;
            if wrap {
                service.begin_record_log(&mut sink)?;
            }
            for record in &records {
                service.save_record(record, RecordContext::default(), &mut sink)?;
            }
            if wrap {
                service.end_record_log(&mut sink)?;
            }
        }
    }
    Ok(())
}
