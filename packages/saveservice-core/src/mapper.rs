//! Translation between type identifiers and the tags written to XML.
//!
//! On write a type identifier becomes its primary alias. On read a tag is
//! looked up in the alias table, passed through the name migrator and
//! checked against the type catalog.

use std::sync::Arc;

use crate::alias::AliasTable;
use crate::catalog::{TypeBinding, TypeCatalog};
use crate::migration::NameMigrator;

/// Alias aware type-name mapper shared by both codec modes.
#[derive(Clone)]
pub struct AliasMapper {
    aliases: Arc<AliasTable>,
    migrator: Arc<dyn NameMigrator>,
    catalog: Arc<TypeCatalog>,
}

impl std::fmt::Debug for AliasMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliasMapper")
            .field("aliases", &self.aliases.len())
            .field("catalog", &self.catalog.len())
            .finish()
    }
}

impl AliasMapper {
    pub fn new(
        aliases: Arc<AliasTable>,
        migrator: Arc<dyn NameMigrator>,
        catalog: Arc<TypeCatalog>,
    ) -> Self {
        Self {
            aliases,
            migrator,
            catalog,
        }
    }

    /// Tag used for values of `type_id`.
    pub fn serialized_name<'a>(&'a self, type_id: &'a str) -> &'a str {
        self.aliases.type_to_alias(type_id)
    }

    /// Current type identifier a tag stands for, before the catalog check.
    ///
    /// Migration also applies to tags without an alias, so a historic type
    /// identifier used directly as a tag loads as its current type. Readers
    /// that leave unaliased tags unmigrated reject such documents.
    pub fn candidate_type(&self, tag: &str) -> String {
        let candidate = self.aliases.alias_to_type(tag);
        self.migrator.current_name(candidate).into_owned()
    }

    /// Catalog binding for `tag`, `None` if the tag names no decodable type.
    pub fn real_type(&self, tag: &str) -> Option<&TypeBinding> {
        let type_id = self.candidate_type(tag);
        let binding = self.catalog.get(&type_id);
        if binding.is_none() {
            tracing::debug!("Tag '{}' resolved to unknown type '{}'", tag, type_id);
        }
        binding
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn migrator(&self) -> &dyn NameMigrator {
        self.migrator.as_ref()
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{MigrationTable, NoMigrations};

    fn mapper(migrator: Arc<dyn NameMigrator>) -> AliasMapper {
        let mut aliases = AliasTable::new();
        aliases.register_alias("HTTPSampler,HTTPSamplerProxy", "org.example.Http");
        aliases.register_alias("OldSampler", "org.example.legacy.Sampler");

        let mut catalog = TypeCatalog::with_builtin_types();
        catalog.register("org.example.Http").unwrap();
        catalog.register("org.example.modern.Sampler").unwrap();

        AliasMapper::new(Arc::new(aliases), migrator, Arc::new(catalog))
    }

    #[test]
    fn write_uses_primary_alias_or_type_id() {
        let mapper = mapper(Arc::new(NoMigrations));
        assert_eq!(mapper.serialized_name("org.example.Http"), "HTTPSampler");
        assert_eq!(mapper.serialized_name("org.example.Other"), "org.example.Other");
    }

    #[test]
    fn read_resolves_every_alias() {
        let mapper = mapper(Arc::new(NoMigrations));
        for tag in ["HTTPSampler", "HTTPSamplerProxy", "org.example.Http"] {
            assert_eq!(mapper.real_type(tag).unwrap().type_id, "org.example.Http");
        }
    }

    #[test]
    fn read_applies_migration_after_alias() {
        let migrations = MigrationTable::from_pairs([(
            "org.example.legacy.Sampler",
            "org.example.modern.Sampler",
        )]);
        let mapper = mapper(Arc::new(migrations));

        assert_eq!(
            mapper.real_type("OldSampler").unwrap().type_id,
            "org.example.modern.Sampler"
        );
        // Historic identifier used directly as a tag.
        assert_eq!(
            mapper.real_type("org.example.legacy.Sampler").unwrap().type_id,
            "org.example.modern.Sampler"
        );
    }

    #[test]
    fn unknown_tags_do_not_resolve() {
        let mapper = mapper(Arc::new(NoMigrations));
        assert!(mapper.real_type("UnknownWidget").is_none());
        assert!(mapper.real_type("OldSampler").is_none());
    }
}
