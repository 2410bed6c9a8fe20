//! Entity graph registry.
//!
//! A read-only lookup from entity name to [`EntityDef`], populated once at
//! startup and shared by every planner afterwards.

use super::{EntityDef, RelationDef, SchemaBundle};
use crate::error::{Error, ValidationError};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

static GLOBAL: OnceLock<Arc<EntityRegistry>> = OnceLock::new();

/// Map from entity name to its metadata.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntityDef>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a schema bundle and validate it.
    pub fn from_bundle(bundle: SchemaBundle) -> Result<Self, Error> {
        let version = bundle.version;
        let mut registry = Self::new();
        for entity in bundle.entities {
            registry.register(entity);
        }
        registry.validate()?;

        info!(
            version,
            entities = registry.len(),
            "entity registry built from schema bundle"
        );
        Ok(registry)
    }

    /// Add or replace the metadata for one entity.
    ///
    /// Returns the previous definition if one was replaced.
    pub fn register(&mut self, entity: EntityDef) -> Option<EntityDef> {
        let previous = self.entities.insert(entity.name.clone(), entity);
        if let Some(prev) = &previous {
            warn!(entity = %prev.name, "entity registration replaced an existing definition");
        }
        previous
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.register(entity);
        self
    }

    /// Look up an entity by name.
    pub fn resolve(&self, entity: &str) -> Result<&EntityDef, ValidationError> {
        self.entities
            .get(entity)
            .ok_or_else(|| ValidationError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    /// Look up a named relationship on an entity.
    pub fn relationship(&self, entity: &str, relation: &str) -> Result<&RelationDef, ValidationError> {
        self.resolve(entity)?
            .get_relation(relation)
            .ok_or_else(|| ValidationError::UnknownRelationship {
                entity: entity.to_string(),
                relation: relation.to_string(),
            })
    }

    /// Check if an entity is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registered entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check that the registered graph is fully resolved.
    ///
    /// Every primary key must be a declared field, every relationship must
    /// target a registered entity, and both join fields must exist.
    pub fn validate(&self) -> Result<(), Error> {
        for entity in self.entities.values() {
            if !entity.has_field(&entity.primary_key) {
                return Err(Error::Schema(format!(
                    "primary key '{}' is not a field of entity '{}'",
                    entity.primary_key, entity.name
                )));
            }

            for relation in &entity.relations {
                let target = self.entities.get(&relation.to_entity).ok_or_else(|| {
                    Error::Schema(format!(
                        "relationship '{}.{}' targets unregistered entity '{}'",
                        entity.name, relation.name, relation.to_entity
                    ))
                })?;
                if !entity.has_field(&relation.from_field) {
                    return Err(Error::Schema(format!(
                        "relationship '{}.{}' joins on missing field '{}.{}'",
                        entity.name, relation.name, entity.name, relation.from_field
                    )));
                }
                if !target.has_field(&relation.to_field) {
                    return Err(Error::Schema(format!(
                        "relationship '{}.{}' joins on missing field '{}.{}'",
                        entity.name, relation.name, target.name, relation.to_field
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Install the process-wide registry.
///
/// The registry is validated first. Only one install is allowed per process.
pub fn install_global(registry: EntityRegistry) -> Result<Arc<EntityRegistry>, Error> {
    registry.validate()?;
    let registry = Arc::new(registry);
    GLOBAL
        .set(Arc::clone(&registry))
        .map_err(|_| Error::Schema("global entity registry is already installed".to_string()))?;
    info!(entities = registry.len(), "installed global entity registry");
    Ok(registry)
}

/// The process-wide registry, if one was installed.
pub fn global() -> Option<Arc<EntityRegistry>> {
    GLOBAL.get().cloned()
}
