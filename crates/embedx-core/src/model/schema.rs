//! Schema reflection
//!
//! An [`EntitySchema`] is the read-only description of one entity type: its
//! scalar fields, its single primary key, an optional autogeneration
//! strategy for that key, and its nested relations. Schemas are built once
//! at registration time and shared behind `Arc`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::entity::Entity;
use super::relation::{empty, Cardinality, Relation, RelationBuilder};
use crate::changeset::Changeset;
use crate::errors::{EmbedError, Result};

/// Declared type of a scalar field
///
/// Only used to pick an id generator; casting scalar values is the job of
/// the layer above this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Id,
    Uuid,
    String,
    Integer,
    Float,
    Boolean,
    Map,
    Any,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Id => "id",
            FieldType::Uuid => "uuid",
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Map => "map",
            FieldType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A declared scalar field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    /// Value a blank entity starts with
    pub default: Value,
    /// Checked by the default change-builder
    pub required: bool,
    pub primary_key: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Value::Null,
            required: false,
            primary_key: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = value;
        self
    }
}

/// Read-only description of one entity type
#[derive(Debug)]
pub struct EntitySchema {
    name: String,
    fields: Vec<FieldDef>,
    primary_key: String,
    autogenerate: Option<FieldType>,
    relations: Vec<Relation>,
}

impl EntitySchema {
    /// Start declaring a schema
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            autogenerate: false,
            relations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared scalar fields, primary key included
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the primary key field; also its external params key
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Field type to request from the adapter when a key must be generated
    pub fn autogenerate(&self) -> Option<FieldType> {
        self.autogenerate
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Look up a nested relation by field name
    ///
    /// # Errors
    ///
    /// Returns `UnknownRelation` if no relation with that field is declared.
    pub fn relation(&self, field: &str) -> Result<&Relation> {
        self.relations
            .iter()
            .find(|r| r.field() == field)
            .ok_or_else(|| EmbedError::UnknownRelation {
                schema: self.name.clone(),
                field: field.to_string(),
            })
    }

    /// Names of fields the default change-builder requires
    pub fn required_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Primary key value of an entity; `None` when unset or null
    pub fn primary_key_of<'e>(&self, entity: &'e Entity) -> Option<&'e Value> {
        entity.get(&self.primary_key).filter(|v| !v.is_null())
    }

    /// A fresh entity holding field defaults and empty relations
    pub fn blank(&self) -> Entity {
        let mut entity = Entity::new(self.name.clone());
        for field in &self.fields {
            entity.put(field.name.clone(), field.default.clone());
        }
        for relation in &self.relations {
            entity.put_embed(relation.field(), empty(relation));
        }
        entity
    }

    /// The default change-builder for this schema
    ///
    /// Copies declared scalar fields present in `params` into the changes
    /// when they differ from `base`, casts nested relations present in
    /// `params`, then validates required fields.
    ///
    /// # Errors
    ///
    /// Propagates fatal errors from casting nested relations.
    pub fn changeset(&self, params: &Map<String, Value>, base: Entity) -> Result<Changeset> {
        let mut changeset = Changeset::new(base);

        for field in &self.fields {
            if let Some(value) = params.get(&field.name) {
                changeset.put_change(field.name.clone(), value.clone());
            }
        }

        for relation in &self.relations {
            if let Some(value) = params.get(relation.field()) {
                changeset.cast_embed(relation, value)?;
            }
        }

        changeset.validate_required(&self.required_fields());
        Ok(changeset)
    }
}

/// Builder for [`EntitySchema`]
///
/// All configuration errors are reported from [`SchemaBuilder::build`].
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
    autogenerate: bool,
    relations: Vec<RelationBuilder>,
}

impl SchemaBuilder {
    /// Declare the primary key field
    pub fn primary_key(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field_def(FieldDef::new(name, ty).primary_key())
    }

    /// Ask the storage adapter to generate the primary key on insert
    pub fn autogenerate(mut self) -> Self {
        self.autogenerate = true;
        self
    }

    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field_def(FieldDef::new(name, ty))
    }

    pub fn required(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field_def(FieldDef::new(name, ty).required())
    }

    pub fn field_def(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a single nested entity using the nested schema's default builder
    pub fn embeds_one(self, field: impl Into<String>, related: Arc<EntitySchema>) -> Self {
        self.relation(
            Relation::builder(field)
                .cardinality(Cardinality::One)
                .related(related),
        )
    }

    /// Declare a nested collection using the nested schema's default builder
    pub fn embeds_many(self, field: impl Into<String>, related: Arc<EntitySchema>) -> Self {
        self.relation(
            Relation::builder(field)
                .cardinality(Cardinality::Many)
                .related(related),
        )
    }

    /// Declare a fully configured relation (custom change-builder, etc.)
    pub fn relation(mut self, relation: RelationBuilder) -> Self {
        self.relations.push(relation);
        self
    }

    /// Validate and freeze the schema
    ///
    /// # Errors
    ///
    /// - `MissingPrimaryKey` - no field is flagged as primary key
    /// - `MultiplePrimaryKeys` - more than one field is
    /// - `DuplicateField` - two fields or relations share a name
    /// - `MissingCardinality` / `MissingRelated` - an incomplete relation
    pub fn build(self) -> Result<EntitySchema> {
        let mut seen = BTreeSet::new();
        for name in self
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.relations.iter().map(|r| r.field_name()))
        {
            if !seen.insert(name) {
                return Err(EmbedError::DuplicateField {
                    schema: self.name.clone(),
                    field: name.to_string(),
                });
            }
        }

        let keys: Vec<&FieldDef> = self.fields.iter().filter(|f| f.primary_key).collect();
        let key = match keys.as_slice() {
            [key] => *key,
            [] => {
                return Err(EmbedError::MissingPrimaryKey {
                    schema: self.name.clone(),
                })
            }
            _ => {
                return Err(EmbedError::MultiplePrimaryKeys {
                    schema: self.name.clone(),
                    fields: keys.iter().map(|f| f.name.clone()).collect(),
                })
            }
        };
        let primary_key = key.name.clone();
        let autogenerate = self.autogenerate.then_some(key.ty);

        let relations = self
            .relations
            .into_iter()
            .map(|r| r.owner(self.name.clone()).build())
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            schema = %self.name,
            fields = self.fields.len(),
            relations = relations.len(),
            "schema built"
        );

        Ok(EntitySchema {
            name: self.name,
            fields: self.fields,
            primary_key,
            autogenerate,
            relations,
        })
    }
}

/// Name-indexed table of registered schemas
///
/// Populated once at registration time and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<EntitySchema>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, returning the shared handle
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSchema` if the name is already registered.
    pub fn register(&mut self, schema: EntitySchema) -> Result<Arc<EntitySchema>> {
        if self.schemas.contains_key(schema.name()) {
            return Err(EmbedError::DuplicateSchema {
                schema: schema.name().to_string(),
            });
        }
        let schema = Arc::new(schema);
        self.schemas
            .insert(schema.name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Look up a schema by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownSchema` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<EntitySchema>> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| EmbedError::UnknownSchema {
                schema: name.to_string(),
            })
    }

    /// Look up the relation declared on `schema` under `field`
    ///
    /// # Errors
    ///
    /// Returns `UnknownSchema` or `UnknownRelation`.
    pub fn relation(&self, schema: &str, field: &str) -> Result<&Relation> {
        self.schemas
            .get(schema)
            .ok_or_else(|| EmbedError::UnknownSchema {
                schema: schema.to_string(),
            })?
            .relation(field)
    }

    /// The schema an entity claims to be an instance of
    ///
    /// # Errors
    ///
    /// Returns `UnknownSchema` if the entity's schema is not registered.
    pub fn schema_of(&self, entity: &Entity) -> Result<Arc<EntitySchema>> {
        self.get(entity.schema())
    }
}
