//! Historic type name migration.
//!
//! Renamed or removed types keep old files loadable: before a type
//! identifier read from a document is used, it is mapped to its current name.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use crate::definitions::DefinitionSource;
use crate::error::SaveError;

/// Longest rename chain followed before giving up.
const MAX_MIGRATION_HOPS: usize = 16;

/// Resolves obsolete type identifiers to current ones.
pub trait NameMigrator: Send + Sync {
    /// Current identifier for `type_id` (unchanged if it was never renamed).
    fn current_name<'a>(&self, type_id: &'a str) -> Cow<'a, str>;

    /// Whether `type_id` is scheduled for migration.
    fn is_known_migration(&self, type_id: &str) -> bool;
}

/// Migrator with nothing to migrate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMigrations;

impl NameMigrator for NoMigrations {
    fn current_name<'a>(&self, type_id: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(type_id)
    }

    fn is_known_migration(&self, _type_id: &str) -> bool {
        false
    }
}

/// Table of `old -> new` renames.
#[derive(Debug, Default, Clone)]
pub struct MigrationTable {
    renames: HashMap<String, String>,
}

impl MigrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `old=new` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self::new();
        for (old, new) in pairs {
            table.insert(old, new);
        }
        table
    }

    /// Loads renames from a properties file of `old=new` lines.
    pub fn from_file(path: &Path) -> Result<Self, SaveError> {
        let source = DefinitionSource::from_file(path)?;
        Ok(Self::from_pairs(source.iter()))
    }

    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let old = old.into();
        let new = new.into();
        if old == new {
            return;
        }
        self.renames.insert(old, new);
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}

impl NameMigrator for MigrationTable {
    fn current_name<'a>(&self, type_id: &'a str) -> Cow<'a, str> {
        let Some(mut current) = self.renames.get(type_id) else {
            return Cow::Borrowed(type_id);
        };
        for _ in 1..MAX_MIGRATION_HOPS {
            match self.renames.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        tracing::debug!("Migrated type {} to {}", type_id, current);
        Cow::Owned(current.clone())
    }

    fn is_known_migration(&self, type_id: &str) -> bool {
        self.renames.contains_key(type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_names_are_borrowed_through() {
        let table = MigrationTable::from_pairs([("org.old.A", "org.new.A")]);
        assert!(matches!(table.current_name("org.other.B"), Cow::Borrowed("org.other.B")));
        assert!(!table.is_known_migration("org.other.B"));
    }

    #[test]
    fn rename_chains_are_followed() {
        let table = MigrationTable::from_pairs([
            ("org.v1.Sampler", "org.v2.Sampler"),
            ("org.v2.Sampler", "org.v3.Sampler"),
        ]);
        assert_eq!(table.current_name("org.v1.Sampler"), "org.v3.Sampler");
        assert_eq!(table.current_name("org.v2.Sampler"), "org.v3.Sampler");
        assert!(table.is_known_migration("org.v1.Sampler"));
        assert!(!table.is_known_migration("org.v3.Sampler"));
    }

    #[test]
    fn cycles_terminate() {
        let table = MigrationTable::from_pairs([("a", "b"), ("b", "a")]);
        let name = table.current_name("a");
        assert!(name == "a" || name == "b");
    }

    #[test]
    fn self_renames_are_ignored() {
        let table = MigrationTable::from_pairs([("a", "a")]);
        assert!(table.is_empty());
    }

    #[test]
    fn no_migrations_is_identity() {
        assert_eq!(NoMigrations.current_name("x"), "x");
        assert!(!NoMigrations.is_known_migration("x"));
    }
}
