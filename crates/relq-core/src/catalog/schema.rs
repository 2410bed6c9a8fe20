//! Schema bundle - versioned snapshot of the entity graph.

use super::{EntityDef, FieldDef, RelationDef, ScalarType};
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};
use serde::Deserialize as SerdeDeserialize;
use std::collections::BTreeMap;

/// A versioned snapshot of every entity in the graph.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version.
    pub version: u64,
    /// Entity definitions.
    pub entities: Vec<EntityDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            entities: Vec::new(),
        }
    }

    /// Add an entity to the schema, replacing one with the same name.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.retain(|e| e.name != entity.name);
        self.entities.push(entity);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Build a schema from a model specification document.
    ///
    /// The document maps entity names to `{table_name, fields, relationships}`,
    /// either bare or wrapped as `{"models": {...}}`.
    /// Relationship join fields are derived from foreign keys: a
    /// `many_to_one` relationship uses the source entity's foreign key to the
    /// target, a `one_to_many` relationship uses the target's foreign key back
    /// to the source. When several foreign keys reach the same entity, the
    /// relationship must name its key with `foreign_key`. Foreign-key targets
    /// are written `table.column`, where `table` is a `table_name` or an
    /// entity name.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let invalid = |e: serde_json::Error| Error::Schema(format!("invalid model specification: {e}"));
        let document: serde_json::Value = serde_json::from_str(json).map_err(invalid)?;
        let document = match document {
            serde_json::Value::Object(mut map)
                if map.len() == 1 && map.get("models").is_some_and(|m| m.is_object()) =>
            {
                map.remove("models").unwrap_or_default()
            }
            other => other,
        };
        let models: BTreeMap<String, ModelSpec> = serde_json::from_value(document).map_err(invalid)?;

        let mut tables = BTreeMap::new();
        for (name, model) in &models {
            let table = model
                .table_name
                .clone()
                .unwrap_or_else(|| name.to_ascii_lowercase());
            tables.insert(table, name.clone());
            tables.insert(name.clone(), name.clone());
        }

        let mut entities: BTreeMap<&str, EntityDef> = BTreeMap::new();
        for (name, model) in &models {
            entities.insert(name.as_str(), entity_from_model(name, model, &tables)?);
        }

        let mut bundle = SchemaBundle::new(1);
        for (name, model) in &models {
            let mut relations = Vec::with_capacity(model.relationships.len());
            for spec in &model.relationships {
                relations.push(relation_from_model(name, spec, &entities)?);
            }
            if let Some(mut entity) = entities.get(name.as_str()).cloned() {
                entity.relations = relations;
                bundle = bundle.with_entity(entity);
            }
        }

        Ok(bundle)
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Schema(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes).map_err(|e| Error::Schema(e.to_string()))
    }
}

impl Default for SchemaBundle {
    fn default() -> Self {
        Self::new(0)
    }
}

#[derive(Debug, SerdeDeserialize)]
struct ModelSpec {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default)]
    relationships: Vec<RelationshipSpec>,
}

#[derive(Debug, SerdeDeserialize)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    primary_key: bool,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    length: Option<u32>,
    #[serde(default)]
    foreign_key: Option<ForeignKeySpec>,
}

#[derive(Debug, SerdeDeserialize)]
struct ForeignKeySpec {
    target: String,
}

#[derive(Debug, SerdeDeserialize)]
struct RelationshipSpec {
    name: String,
    kind: String,
    target: String,
    #[serde(default)]
    back_populates: Option<String>,
    /// Join field, required when the foreign key is ambiguous.
    #[serde(default)]
    foreign_key: Option<String>,
}

fn default_nullable() -> bool {
    true
}

fn entity_from_model(
    name: &str,
    model: &ModelSpec,
    tables: &BTreeMap<String, String>,
) -> Result<EntityDef, Error> {
    let mut primary_key = None;
    let mut fields = Vec::with_capacity(model.fields.len());

    for spec in &model.fields {
        let scalar = ScalarType::from_model_name(&spec.kind).ok_or_else(|| {
            Error::Schema(format!(
                "field '{}.{}' has unsupported type '{}'",
                name, spec.name, spec.kind
            ))
        })?;

        let mut field = FieldDef::new(&spec.name, scalar);
        field.nullable = spec.nullable && !spec.primary_key;
        field.max_length = spec.length;

        if let Some(fk) = &spec.foreign_key {
            let (table, column) = fk.target.split_once('.').ok_or_else(|| {
                Error::Schema(format!(
                    "foreign key '{}' on '{}.{}' must be written table.column",
                    fk.target, name, spec.name
                ))
            })?;
            let entity = tables.get(table).ok_or_else(|| {
                Error::Schema(format!(
                    "foreign key on '{}.{}' references unknown table '{}'",
                    name, spec.name, table
                ))
            })?;
            field = field.references(entity.as_str(), column);
        }

        if spec.primary_key {
            if let Some(existing) = &primary_key {
                return Err(Error::Schema(format!(
                    "entity '{name}' declares more than one primary key ('{existing}', '{}')",
                    spec.name
                )));
            }
            primary_key = Some(spec.name.clone());
        }
        fields.push(field);
    }

    let primary_key = primary_key
        .ok_or_else(|| Error::Schema(format!("entity '{name}' has no primary key")))?;

    Ok(EntityDef::new(name, primary_key).with_fields(fields))
}

fn relation_from_model(
    source: &str,
    spec: &RelationshipSpec,
    entities: &BTreeMap<&str, EntityDef>,
) -> Result<RelationDef, Error> {
    let missing = |what: &str| {
        Error::Schema(format!(
            "relationship '{source}.{}' {what}",
            spec.name
        ))
    };

    let from = entities
        .get(source)
        .ok_or_else(|| missing("has no source entity"))?;
    let to = entities
        .get(spec.target.as_str())
        .ok_or_else(|| missing(&format!("targets unknown entity '{}'", spec.target)))?;

    let relation = match spec.kind.as_str() {
        "many_to_one" => {
            let (fk, fk_target) = foreign_key_to(from, &to.name, spec.foreign_key.as_deref())
                .map_err(|e| missing(&e))?;
            RelationDef::many_to_one(&spec.name, source, fk, &to.name, fk_target)
        }
        "one_to_many" => {
            let (fk, fk_target) = foreign_key_to(to, source, spec.foreign_key.as_deref())
                .map_err(|e| missing(&e))?;
            RelationDef::one_to_many(&spec.name, source, fk_target, &to.name, fk)
        }
        other => return Err(missing(&format!("has unsupported kind '{other}'"))),
    };

    Ok(match &spec.back_populates {
        Some(back) => relation.with_back_reference(back),
        None => relation,
    })
}

/// The field on `entity` that references `target`, with the referenced column.
///
/// `named` selects among several candidates; without it exactly one
/// candidate must exist.
fn foreign_key_to<'a>(
    entity: &'a EntityDef,
    target: &str,
    named: Option<&str>,
) -> Result<(&'a str, &'a str), String> {
    let mut candidates = entity.fields.iter().filter_map(|f| {
        f.references
            .as_ref()
            .filter(|fk| fk.entity == target)
            .map(|fk| (f.name.as_str(), fk.field.as_str()))
    });

    if let Some(name) = named {
        return candidates.find(|(field, _)| *field == name).ok_or_else(|| {
            format!("names '{}.{name}', which is not a foreign key to '{target}'", entity.name)
        });
    }

    match (candidates.next(), candidates.next()) {
        (Some(found), None) => Ok(found),
        (None, _) => Err(format!("has no foreign key on '{}' to '{target}'", entity.name)),
        (Some((first, _)), Some((second, _))) => Err(format!(
            "is ambiguous: '{}' has foreign keys '{first}' and '{second}' to '{target}'; \
             name one with foreign_key",
            entity.name
        )),
    }
}
