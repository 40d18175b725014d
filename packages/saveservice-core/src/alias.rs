//! Bidirectional alias registry.
//!
//! Maps short alias tokens used as XML tags to type identifiers and back.
//! Overlapping registrations are tolerated: the last one wins and the
//! collision is logged and recorded so tooling can report it.

use std::collections::HashMap;

use serde::Serialize;

/// A registration that replaced an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AliasCollision {
    /// An alias already pointed at a type and now points at `type_id`.
    DuplicateType {
        alias: String,
        type_id: String,
        previous: String,
    },
    /// A type already had a primary alias and now has `alias`.
    DuplicateAlias {
        type_id: String,
        alias: String,
        previous: String,
    },
}

/// Alias table: `alias -> type_id` and `type_id -> primary alias`.
#[derive(Debug, Default)]
pub struct AliasTable {
    alias_to_type: HashMap<String, String>,
    type_to_alias: HashMap<String, String>,
    collisions: Vec<AliasCollision>,
}

impl AliasTable {
    /// Creates a new empty alias table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a comma separated alias list for `type_id`.
    ///
    /// The first alias in the list becomes the primary alias used on write;
    /// every alias in the list resolves to `type_id` on read.
    pub fn register_alias(&mut self, alias_list: &str, type_id: &str) {
        let mut aliases = alias_list
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .peekable();
        let Some(primary) = aliases.peek().map(|a| a.to_string()) else {
            tracing::warn!("Ignoring empty alias list for {}", type_id);
            return;
        };

        for alias in aliases {
            if let Some(previous) = self
                .alias_to_type
                .insert(alias.to_string(), type_id.to_string())
            {
                tracing::error!(
                    "Duplicate class detected for {}: {} & {}",
                    alias,
                    type_id,
                    previous
                );
                self.collisions.push(AliasCollision::DuplicateType {
                    alias: alias.to_string(),
                    type_id: type_id.to_string(),
                    previous,
                });
            }
        }

        if let Some(previous) = self
            .type_to_alias
            .insert(type_id.to_string(), primary.clone())
        {
            tracing::error!(
                "Duplicate alias detected for {}: {} & {}",
                type_id,
                primary,
                previous
            );
            self.collisions.push(AliasCollision::DuplicateAlias {
                type_id: type_id.to_string(),
                alias: primary,
                previous,
            });
        }
    }

    /// Type identifier for `alias`, or `alias` itself if unmapped.
    pub fn alias_to_type<'a>(&'a self, alias: &'a str) -> &'a str {
        self.lookup_type(alias).unwrap_or(alias)
    }

    /// Primary alias for `type_id`, or `type_id` itself if unmapped.
    pub fn type_to_alias<'a>(&'a self, type_id: &'a str) -> &'a str {
        self.lookup_alias(type_id).unwrap_or(type_id)
    }

    pub fn lookup_type(&self, alias: &str) -> Option<&str> {
        self.alias_to_type.get(alias).map(String::as_str)
    }

    pub fn lookup_alias(&self, type_id: &str) -> Option<&str> {
        self.type_to_alias.get(type_id).map(String::as_str)
    }

    /// Every type identifier that has a primary alias.
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.type_to_alias.keys().map(String::as_str)
    }

    /// Collisions recorded during registration, in order.
    pub fn collisions(&self) -> &[AliasCollision] {
        &self.collisions
    }

    /// Number of registered aliases.
    pub fn len(&self) -> usize {
        self.alias_to_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alias_to_type.is_empty()
    }
}
