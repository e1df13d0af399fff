use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::relation::Cardinality;

/// A materialized entity value
///
/// Entities are dynamic records tagged with the name of the schema they
/// belong to. Scalar fields hold JSON values; nested relations hold owned
/// child entities, so an entity is always an acyclic tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Name of the schema this entity is an instance of
    schema: String,

    /// Scalar field values keyed by field name
    #[serde(default)]
    fields: BTreeMap<String, Value>,

    /// Nested relation values keyed by relation field name
    #[serde(default)]
    embeds: BTreeMap<String, Embedded>,
}

/// The value held by a nested relation field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Embedded {
    One(Option<Box<Entity>>),
    Many(Vec<Entity>),
}

impl Entity {
    /// Create an entity of the given schema with no fields set
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            fields: BTreeMap::new(),
            embeds: BTreeMap::new(),
        }
    }

    /// Builder-style scalar field setter
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.put(field, value);
        self
    }

    /// Builder-style setter for a single nested entity
    pub fn with_one(mut self, field: impl Into<String>, entity: Option<Entity>) -> Self {
        self.put_embed(field, Embedded::One(entity.map(Box::new)));
        self
    }

    /// Builder-style setter for a nested collection
    pub fn with_many(mut self, field: impl Into<String>, entities: Vec<Entity>) -> Self {
        self.put_embed(field, Embedded::Many(entities));
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Scalar field value, if set
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn put(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Nested relation value, if set
    pub fn embed(&self, field: &str) -> Option<&Embedded> {
        self.embeds.get(field)
    }

    pub fn put_embed(&mut self, field: impl Into<String>, value: Embedded) {
        self.embeds.insert(field.into(), value);
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn embeds(&self) -> &BTreeMap<String, Embedded> {
        &self.embeds
    }
}

impl Embedded {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Embedded::One(_) => Cardinality::One,
            Embedded::Many(_) => Cardinality::Many,
        }
    }

    /// True for `One(None)` and `Many([])`
    pub fn is_empty(&self) -> bool {
        match self {
            Embedded::One(entity) => entity.is_none(),
            Embedded::Many(entities) => entities.is_empty(),
        }
    }

    /// The single nested entity, if this is a populated `One`
    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            Embedded::One(entity) => entity.as_deref(),
            Embedded::Many(_) => None,
        }
    }

    /// The nested collection, or an empty slice for `One`
    pub fn as_many(&self) -> &[Entity] {
        match self {
            Embedded::Many(entities) => entities,
            Embedded::One(_) => &[],
        }
    }
}
