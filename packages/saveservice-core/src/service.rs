//! Save service facade.
//!
//! [`SaveService`] reads the definition source once, builds the alias table,
//! converter set and schema markers, and freezes them. All save and load
//! operations go through the frozen state; nothing is mutated afterwards.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::alias::{AliasCollision, AliasTable};
use crate::audit::audit_registered_types;
use crate::catalog::TypeCatalog;
use crate::charset::{resolve_charset, Charset};
use crate::codec::{RecordContext, RecordSink};
use crate::config::SaveServiceConfig;
use crate::converter::{ConverterFactories, ConverterSet, FORMAT_VERSION};
use crate::definitions::{DefinitionEntry, DefinitionSource};
use crate::error::SaveError;
use crate::integrity::{compute_checksum, IntegrityWarning, SchemaVersion};
use crate::io_utils::classify_init_error;
use crate::mapper::AliasMapper;
use crate::marshaller::Marshaller;
use crate::migration::{NameMigrator, NoMigrations};
use crate::model::{PlanTree, Value};

/// Summary of the initialized service, for tooling.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub format_version: String,
    pub schema: SchemaVersion,
    pub file_encoding: String,
    pub alias_count: usize,
    pub converters: Vec<String>,
    pub integrity_warnings: Vec<IntegrityWarning>,
    pub alias_collisions: Vec<AliasCollision>,
    pub converter_errors: Vec<String>,
    pub unregistered_types: Vec<String>,
}

impl ServiceReport {
    pub fn to_json(&self) -> Result<String, SaveError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SaveError::Serialization(format!("Failed to write report: {}", e)))
    }
}

/// Collaborators used while building a [`SaveService`].
pub struct SaveServiceBuilder {
    config: SaveServiceConfig,
    catalog: TypeCatalog,
    migrator: Arc<dyn NameMigrator>,
    factories: ConverterFactories,
}

impl SaveServiceBuilder {
    pub fn new(config: SaveServiceConfig) -> Self {
        Self {
            config,
            catalog: TypeCatalog::with_builtin_types(),
            migrator: Arc::new(NoMigrations),
            factories: ConverterFactories::standard(),
        }
    }

    /// Types the running code can decode.
    pub fn catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn migrator(mut self, migrator: Arc<dyn NameMigrator>) -> Self {
        self.migrator = migrator;
        self
    }

    /// Converters that definition entries may request.
    pub fn factories(mut self, factories: ConverterFactories) -> Self {
        self.factories = factories;
        self
    }

    /// Reads the configured definition file and initializes the service.
    ///
    /// Fails only if the file cannot be read.
    pub fn load(self) -> Result<SaveService, SaveError> {
        let path = self.config.definitions_path();
        let bytes = fs::read(&path).map_err(|e| {
            classify_init_error(
                e,
                &format!("Bad definition source '{}'", path.display()),
            )
        })?;
        tracing::debug!("Read definition source {}", path.display());
        self.load_bytes(&bytes)
    }

    /// Initializes the service from raw definition text.
    pub fn load_bytes(self, bytes: &[u8]) -> Result<SaveService, SaveError> {
        let checksum = compute_checksum(bytes);
        let source = DefinitionSource::parse(&String::from_utf8_lossy(bytes));
        self.build(source, checksum)
    }

    /// Initializes the service from already parsed pairs.
    ///
    /// The checksum is taken over the pairs rendered as `key=value` lines.
    pub fn load_source(self, source: DefinitionSource) -> Result<SaveService, SaveError> {
        let rendered: String = source
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        let checksum = compute_checksum(rendered.as_bytes());
        self.build(source, checksum)
    }

    fn build(self, source: DefinitionSource, checksum: String) -> Result<SaveService, SaveError> {
        tracing::info!("Using SaveService format version {}", FORMAT_VERSION);

        let mut aliases = AliasTable::new();
        let mut declared = String::new();
        let mut file_encoding = None;
        let mut registrations = Vec::new();

        for entry in source.classified() {
            match entry {
                DefinitionEntry::Alias { aliases: list, type_id } => {
                    aliases.register_alias(&list, &type_id)
                }
                DefinitionEntry::Version(version) => declared = version,
                DefinitionEntry::FileEncoding(encoding) => file_encoding = Some(encoding),
                DefinitionEntry::ObsoleteFileVersion => {
                    tracing::info!("_file_version is obsolete and was ignored")
                }
                DefinitionEntry::Converter(registration) => registrations.push(registration),
            }
        }
        let aliases = Arc::new(aliases);

        let mut converters = ConverterSet::new();
        let mut converter_errors = Vec::new();
        for registration in &registrations {
            match self.factories.build(registration, &aliases) {
                Ok(converter) => converters.register(converter),
                Err(e) => {
                    tracing::warn!("Can't register converter: {}", e);
                    converter_errors.push(e);
                }
            }
        }

        let schema = SchemaVersion::new(declared, checksum);
        let integrity_warnings = schema.verify(
            &self.config.expected_version,
            self.config.expected_checksum.as_deref(),
        );
        tracing::info!("Using SaveService properties version {}", schema.declared);

        let charset = resolve_charset(file_encoding.as_deref(), &self.config.default_encoding);
        match &charset {
            Ok(charset) => {
                tracing::info!("Using SaveService properties file encoding {}", charset.name())
            }
            Err(e) => tracing::warn!("Unusable file encoding: {}", e),
        }

        let catalog = Arc::new(self.catalog);
        let mapper = AliasMapper::new(Arc::clone(&aliases), Arc::clone(&self.migrator), catalog);
        let marshaller = Marshaller::new(
            mapper,
            Arc::new(converters),
            charset.clone().unwrap_or_default(),
            schema.declared.as_str(),
            self.config.application_version.as_str(),
        );

        Ok(SaveService {
            config: self.config,
            aliases,
            migrator: self.migrator,
            schema,
            file_encoding,
            charset,
            marshaller,
            integrity_warnings,
            converter_errors,
        })
    }
}

/// Initialized, immutable save service.
pub struct SaveService {
    config: SaveServiceConfig,
    aliases: Arc<AliasTable>,
    migrator: Arc<dyn NameMigrator>,
    schema: SchemaVersion,
    file_encoding: Option<String>,
    charset: Result<Charset, SaveError>,
    marshaller: Marshaller,
    integrity_warnings: Vec<IntegrityWarning>,
    converter_errors: Vec<SaveError>,
}

impl std::fmt::Debug for SaveService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveService")
            .field("schema", &self.schema)
            .field("aliases", &self.aliases.len())
            .field("file_encoding", &self.file_encoding)
            .field("marshaller", &self.marshaller)
            .finish_non_exhaustive()
    }
}

impl SaveService {
    pub fn builder(config: SaveServiceConfig) -> SaveServiceBuilder {
        SaveServiceBuilder::new(config)
    }

    /// Initializes from the configured definition file with default collaborators.
    pub fn load(config: SaveServiceConfig) -> Result<Self, SaveError> {
        SaveServiceBuilder::new(config).load()
    }

    /// Initializes from parsed definitions with default collaborators.
    pub fn from_source(config: SaveServiceConfig, source: DefinitionSource) -> Result<Self, SaveError> {
        SaveServiceBuilder::new(config).load_source(source)
    }

    pub fn config(&self) -> &SaveServiceConfig {
        &self.config
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn catalog(&self) -> &TypeCatalog {
        self.marshaller.mapper().catalog()
    }

    pub fn marshaller(&self) -> &Marshaller {
        &self.marshaller
    }

    pub fn alias_to_type<'a>(&'a self, alias: &'a str) -> &'a str {
        self.aliases.alias_to_type(alias)
    }

    pub fn type_to_alias<'a>(&'a self, type_id: &'a str) -> &'a str {
        self.aliases.type_to_alias(type_id)
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema
    }

    /// `_version` declared by the definition source.
    pub fn declared_version(&self) -> &str {
        &self.schema.declared
    }

    /// Document format version written into envelopes.
    pub fn format_version(&self) -> &'static str {
        FORMAT_VERSION
    }

    /// `_file_encoding` from the definitions, or `default`.
    pub fn file_encoding_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.file_encoding
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(default)
    }

    /// Charset documents are written and read in.
    pub fn resolve_file_encoding(&self) -> Result<Charset, SaveError> {
        self.charset.clone()
    }

    pub fn integrity_warnings(&self) -> &[IntegrityWarning] {
        &self.integrity_warnings
    }

    /// Converter registrations that failed during initialization.
    pub fn converter_errors(&self) -> &[SaveError] {
        &self.converter_errors
    }

    pub fn alias_collisions(&self) -> &[AliasCollision] {
        self.aliases.collisions()
    }

    /// Registered type identifiers the catalog cannot decode.
    pub fn audit_registered_types(&self) -> Vec<String> {
        audit_registered_types(&self.aliases, self.migrator.as_ref(), self.catalog())
    }

    pub fn save_document<W: Write>(&self, tree: &PlanTree, sink: &mut W) -> Result<(), SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.save_document(tree, sink)
    }

    pub fn load_document<R: Read>(&self, source: R) -> Result<PlanTree, SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.load_document(source)
    }

    pub fn load_document_file(&self, path: &Path) -> Result<PlanTree, SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.load_document_file(path)
    }

    pub fn save_element<W: Write>(&self, value: &Value, sink: &mut W) -> Result<(), SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.save_element(value, sink)
    }

    pub fn load_element<R: Read>(&self, source: R) -> Result<Value, SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.load_element(source)
    }

    pub fn save_record<W: Write>(
        &self,
        record: &Value,
        ctx: RecordContext<'_>,
        sink: &mut W,
    ) -> Result<(), SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.save_record(record, ctx, sink)
    }

    pub fn load_records<R: Read>(
        &self,
        source: R,
        sink: &mut dyn RecordSink,
    ) -> Result<usize, SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.load_records(source, sink)
    }

    pub fn begin_record_log<W: Write>(&self, sink: &mut W) -> Result<(), SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.begin_record_log(sink)
    }

    pub fn end_record_log<W: Write>(&self, sink: &mut W) -> Result<(), SaveError> {
        self.resolve_file_encoding()?;
        self.marshaller.end_record_log(sink)
    }

    pub fn report(&self) -> ServiceReport {
        ServiceReport {
            format_version: FORMAT_VERSION.to_string(),
            schema: self.schema.clone(),
            file_encoding: self
                .file_encoding_or(&self.config.default_encoding)
                .to_string(),
            alias_count: self.aliases.len(),
            converters: self
                .marshaller
                .converters()
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            integrity_warnings: self.integrity_warnings.clone(),
            alias_collisions: self.aliases.collisions().to_vec(),
            converter_errors: self.converter_errors.iter().map(|e| e.to_string()).collect(),
            unregistered_types: self.audit_registered_types(),
        }
    }
}
