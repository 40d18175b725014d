//! Check that every aliased type is known to the running code.

use crate::alias::AliasTable;
use crate::catalog::TypeCatalog;
use crate::migration::NameMigrator;

/// Returns the registered type identifiers the catalog cannot decode.
///
/// Identifiers that are known migrations are skipped; documents naming them
/// load through their current name. Each failure is logged. The result is
/// sorted.
pub fn audit_registered_types(
    aliases: &AliasTable,
    migrator: &dyn NameMigrator,
    catalog: &TypeCatalog,
) -> Vec<String> {
    let mut missing: Vec<String> = aliases
        .type_ids()
        .filter(|type_id| !migrator.is_known_migration(type_id))
        .filter(|type_id| !catalog.contains(type_id))
        .map(str::to_string)
        .collect();
    missing.sort();

    for type_id in &missing {
        tracing::error!(
            "Unexpected error checking {} ({}): type is not registered",
            type_id,
            aliases.type_to_alias(type_id)
        );
    }
    if missing.is_empty() {
        tracing::debug!("All {} aliased types are registered", aliases.type_ids().count());
    }
    missing
}
