use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::entity::{Embedded, Entity};
use super::schema::EntitySchema;
use crate::changeset::Changeset;
use crate::errors::{EmbedError, Result};

/// Whether a relation holds one nested entity or an ordered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::One => f.write_str("one"),
            Cardinality::Many => f.write_str("many"),
        }
    }
}

/// How existing nested data is reconciled with new input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Key mismatch replaces the nested entity instead of merging into it
    #[default]
    Replace,
}

/// Pluggable change-builder: `(raw params, base entity) -> changeset`
///
/// The builder may run arbitrary validation and record field errors on the
/// changeset it returns. The engine sets the action afterwards.
pub type ChangeBuilder =
    Arc<dyn Fn(&Map<String, Value>, Entity) -> Result<Changeset> + Send + Sync>;

/// Immutable metadata for one nested relation
///
/// Built once at schema registration and owned by the owning schema for the
/// life of the process.
#[derive(Clone)]
pub struct Relation {
    cardinality: Cardinality,
    field: String,
    owner: String,
    related: Arc<EntitySchema>,
    strategy: Strategy,
    builder: ChangeBuilder,
}

impl Relation {
    /// Start declaring the relation stored under `field`
    pub fn builder(field: impl Into<String>) -> RelationBuilder {
        RelationBuilder {
            field: field.into(),
            owner: String::new(),
            cardinality: None,
            related: None,
            strategy: Strategy::default(),
            builder: None,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Name of the schema declaring this relation
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Schema of the nested entities
    pub fn related(&self) -> &EntitySchema {
        &self.related
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Run the change-builder over raw params and a base entity
    ///
    /// # Errors
    ///
    /// Propagates whatever the change-builder returns.
    pub fn build_changeset(&self, params: &Map<String, Value>, base: Entity) -> Result<Changeset> {
        (self.builder)(params, base)
    }
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("cardinality", &self.cardinality)
            .field("field", &self.field)
            .field("owner", &self.owner)
            .field("related", &self.related.name())
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Relation`]
///
/// The owner is filled in when the relation is attached to a schema through
/// [`SchemaBuilder::relation`](super::schema::SchemaBuilder::relation).
pub struct RelationBuilder {
    field: String,
    owner: String,
    cardinality: Option<Cardinality>,
    related: Option<Arc<EntitySchema>>,
    strategy: Strategy,
    builder: Option<ChangeBuilder>,
}

impl RelationBuilder {
    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    pub fn related(mut self, related: Arc<EntitySchema>) -> Self {
        self.related = Some(related);
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the nested schema's default change-builder
    pub fn with_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&Map<String, Value>, Entity) -> Result<Changeset> + Send + Sync + 'static,
    {
        let builder: ChangeBuilder = Arc::new(builder);
        self.builder = Some(builder);
        self
    }

    pub(crate) fn field_name(&self) -> &str {
        &self.field
    }

    /// Freeze the relation
    ///
    /// # Errors
    ///
    /// - `MissingCardinality` - `cardinality` was never set
    /// - `MissingRelated` - `related` was never set
    pub fn build(self) -> Result<Relation> {
        let cardinality = self.cardinality.ok_or_else(|| EmbedError::MissingCardinality {
            field: self.field.clone(),
        })?;
        let related = self.related.ok_or_else(|| EmbedError::MissingRelated {
            field: self.field.clone(),
        })?;
        let builder: ChangeBuilder = match self.builder {
            Some(builder) => builder,
            None => {
                let schema = Arc::clone(&related);
                Arc::new(move |params: &Map<String, Value>, base: Entity| {
                    schema.changeset(params, base)
                })
            }
        };

        Ok(Relation {
            cardinality,
            field: self.field,
            owner: self.owner,
            related,
            strategy: self.strategy,
            builder,
        })
    }
}

/// The value of a relation that holds nothing
///
/// `One(None)` for cardinality one, `Many([])` for cardinality many.
pub fn empty(relation: &Relation) -> Embedded {
    match relation.cardinality() {
        Cardinality::One => Embedded::One(None),
        Cardinality::Many => Embedded::Many(Vec::new()),
    }
}
