//! Catalog of types the running code can decode.
//!
//! Every type identifier a document may name has to be registered here up
//! front; a tag that resolves to an unregistered identifier is a decode error.

use std::collections::HashMap;

/// Type identifier of text values.
pub const STRING_TYPE: &str = "string";

/// Tag written for null entries.
pub const NULL_TAG: &str = "null";

/// Type identifier of the test plan envelope.
pub const ENVELOPE_TYPE: &str = "org.apache.jmeter.save.ScriptWrapper";

/// Type identifier of plan trees.
pub const TREE_TYPE: &str = "org.apache.jorphan.collections.ListedHashTree";

/// Type identifier of the result log wrapper element.
pub const RESULT_WRAPPER_TYPE: &str = "org.apache.jmeter.save.TestResultWrapper";

/// Error type for catalog registration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Type '{type_id}' already registered")]
    AlreadyRegistered { type_id: String },

    #[error("Invalid type identifier '{type_id}'")]
    InvalidTypeId { type_id: String },
}

/// Registration of a decodable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeBinding {
    /// Type identifier
    pub type_id: String,
    /// Whether decoding needs a dedicated converter (the generic object
    /// converter cannot reconstruct this type)
    pub requires_converter: bool,
}

/// Registry of decodable types.
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    types: HashMap<String, TypeBinding>,
}

impl TypeCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the types the service itself produces.
    pub fn with_builtin_types() -> Self {
        let mut catalog = Self::new();
        for (type_id, requires_converter) in [
            (STRING_TYPE, false),
            (TREE_TYPE, true),
            (ENVELOPE_TYPE, true),
            (RESULT_WRAPPER_TYPE, true),
        ] {
            catalog.types.insert(
                type_id.to_string(),
                TypeBinding {
                    type_id: type_id.to_string(),
                    requires_converter,
                },
            );
        }
        catalog
    }

    /// Registers a type decodable by the generic object converter.
    pub fn register(&mut self, type_id: &str) -> Result<(), CatalogError> {
        self.insert(TypeBinding {
            type_id: type_id.to_string(),
            requires_converter: false,
        })
    }

    /// Registers a type that only a dedicated converter can decode.
    pub fn register_custom(&mut self, type_id: &str) -> Result<(), CatalogError> {
        self.insert(TypeBinding {
            type_id: type_id.to_string(),
            requires_converter: true,
        })
    }

    /// Registers every identifier in `type_ids`, skipping ones already present.
    pub fn register_all<'a>(&mut self, type_ids: impl IntoIterator<Item = &'a str>) {
        for type_id in type_ids {
            if let Err(e) = self.register(type_id) {
                tracing::debug!("Skipping catalog entry: {}", e);
            }
        }
    }

    fn insert(&mut self, binding: TypeBinding) -> Result<(), CatalogError> {
        if binding.type_id.is_empty() || binding.type_id.chars().any(char::is_whitespace) {
            return Err(CatalogError::InvalidTypeId {
                type_id: binding.type_id,
            });
        }
        if self.types.contains_key(&binding.type_id) {
            return Err(CatalogError::AlreadyRegistered {
                type_id: binding.type_id,
            });
        }
        self.types.insert(binding.type_id.clone(), binding);
        Ok(())
    }

    /// Retrieves a binding by identifier.
    pub fn get(&self, type_id: &str) -> Option<&TypeBinding> {
        self.types.get(type_id)
    }

    /// Checks if a type is registered.
    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    /// Returns all registered type identifiers.
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_are_present() {
        let catalog = TypeCatalog::with_builtin_types();
        assert!(catalog.contains(STRING_TYPE));
        assert!(catalog.get(TREE_TYPE).unwrap().requires_converter);
        assert!(catalog.get(ENVELOPE_TYPE).unwrap().requires_converter);
        assert!(!catalog.get(STRING_TYPE).unwrap().requires_converter);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut catalog = TypeCatalog::new();
        catalog.register("org.example.TestPlan").unwrap();
        assert_eq!(
            catalog.register("org.example.TestPlan"),
            Err(CatalogError::AlreadyRegistered {
                type_id: "org.example.TestPlan".to_string()
            })
        );
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        let mut catalog = TypeCatalog::new();
        assert!(matches!(
            catalog.register(""),
            Err(CatalogError::InvalidTypeId { .. })
        ));
        assert!(matches!(
            catalog.register("org.example.Bad Name"),
            Err(CatalogError::InvalidTypeId { .. })
        ));
    }

    #[test]
    fn register_all_tolerates_repeats() {
        let mut catalog = TypeCatalog::with_builtin_types();
        let before = catalog.len();
        catalog.register_all(["org.example.A", "org.example.B", "org.example.A", STRING_TYPE]);
        assert_eq!(catalog.len(), before + 2);
    }
}
