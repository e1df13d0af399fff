//! Change pipeline: structural diff of already-materialized values
//!
//! Used when state is trusted (entities loaded from storage, or changesets a
//! caller already validated). No change-builder runs here; the descriptor
//! for each nested entity is computed directly from the value and the
//! current entity it is paired with.

use std::time::Instant;

use crate::changeset::{Action, Change, Changeset, EmbedChange};
use crate::diff::{canonical_key, diff_collection, Pair};
use crate::errors::{EmbedError, Result};
use crate::model::{empty, Cardinality, Embedded, Entity, EntitySchema, Relation};
use crate::{log_op_end, log_op_error, log_op_start};

/// One nested value handed to the change pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeInput {
    /// A bare entity value, diffed against whatever it is paired with
    Entity(Entity),
    /// A pre-built changeset, which must target the entity it is paired with
    Changeset(Changeset),
}

/// New value of a nested relation for the change pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedInput {
    One(Option<ChangeInput>),
    Many(Vec<ChangeInput>),
}

impl From<Entity> for ChangeInput {
    fn from(entity: Entity) -> Self {
        ChangeInput::Entity(entity)
    }
}

impl From<Changeset> for ChangeInput {
    fn from(changeset: Changeset) -> Self {
        ChangeInput::Changeset(changeset)
    }
}

impl From<&Embedded> for EmbedInput {
    fn from(embedded: &Embedded) -> Self {
        match embedded {
            Embedded::One(entity) => {
                EmbedInput::One(entity.as_deref().cloned().map(ChangeInput::Entity))
            }
            Embedded::Many(entities) => {
                EmbedInput::Many(entities.iter().cloned().map(ChangeInput::Entity).collect())
            }
        }
    }
}

impl EmbedInput {
    /// The input that clears a relation of the given cardinality
    pub fn none(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::One => EmbedInput::One(None),
            Cardinality::Many => EmbedInput::Many(Vec::new()),
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            EmbedInput::One(_) => Cardinality::One,
            EmbedInput::Many(_) => Cardinality::Many,
        }
    }
}

/// Diff a materialized value against the current value of a relation
///
/// Returns the relation aggregate and the AND of every nested descriptor's
/// validity. Pre-built changesets keep their own validity; structural diffs
/// are always valid.
///
/// # Errors
///
/// - `CardinalityMismatch` - `input` or `current` has the wrong shape
/// - `ChangesetTargetMismatch` - a pre-built changeset targets another entity
/// - `SchemaMismatch` - a bare entity of a foreign schema
/// - `MissingCurrentKey` - a current collection entry has no primary key
pub fn change(
    relation: &Relation,
    input: EmbedInput,
    current: &Embedded,
) -> Result<(EmbedChange, bool)> {
    log_op_start!("change", relation = relation.field());
    let start = Instant::now();

    let result = change_relation(relation, input, current).map_err(|e| {
        log_op_error!(
            "change",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "change",
        duration_ms = start.elapsed().as_millis() as u64,
        valid = result.1
    );

    Ok(result)
}

pub(crate) fn change_relation(
    relation: &Relation,
    input: EmbedInput,
    current: &Embedded,
) -> Result<(EmbedChange, bool)> {
    let expected = relation.cardinality();
    if input.cardinality() != expected || current.cardinality() != expected {
        return Err(EmbedError::CardinalityMismatch {
            field: relation.field().to_string(),
            expected: expected.to_string(),
        });
    }

    let related = relation.related();
    match input {
        EmbedInput::One(input) => {
            let changeset = match (input, current.as_one()) {
                (None, None) => return Ok((EmbedChange::One(None), true)),
                (None, Some(entity)) => delete_changeset(related, entity)?,
                (Some(input), entity) => change_one(relation, input, entity)?,
            };
            let valid = changeset.valid;
            Ok((EmbedChange::One(Some(Box::new(changeset))), valid))
        }
        EmbedInput::Many(inputs) => {
            let key_of = |input: &ChangeInput| {
                let entity = match input {
                    ChangeInput::Entity(entity) => entity,
                    ChangeInput::Changeset(changeset) => &changeset.data,
                };
                related.primary_key_of(entity).and_then(canonical_key)
            };

            let (changesets, valid) =
                diff_collection(relation, inputs, current.as_many(), key_of, |pair| match pair {
                    Pair::Matched(input, entity) => change_one(relation, input, Some(entity)),
                    Pair::New(input) => change_one(relation, input, None),
                    Pair::Orphaned(entity) => delete_changeset(related, entity),
                })?;
            Ok((EmbedChange::Many(changesets), valid))
        }
    }
}

fn change_one(relation: &Relation, input: ChangeInput, current: Option<&Entity>) -> Result<Changeset> {
    let related = relation.related();
    match input {
        ChangeInput::Changeset(mut changeset) => {
            let action = match current {
                Some(entity) if changeset.data == *entity => Action::Update,
                None if related.primary_key_of(&changeset.data).is_none() => Action::Insert,
                _ => {
                    return Err(EmbedError::ChangesetTargetMismatch {
                        field: relation.field().to_string(),
                    })
                }
            };
            changeset.action = Some(action);
            Ok(changeset)
        }
        ChangeInput::Entity(value) => {
            if value.schema() != related.name() {
                return Err(EmbedError::SchemaMismatch {
                    field: relation.field().to_string(),
                    expected: related.name().to_string(),
                    found: value.schema().to_string(),
                });
            }
            match current {
                Some(entity) => update_changeset(related, &value, entity),
                None => insert_changeset(related, &value),
            }
        }
    }
}

/// Insert descriptor: the value projected onto a blank entity
///
/// Declared scalar fields the value carries are recorded unconditionally;
/// nested relations are diffed against nothing, so they are inserted too.
fn insert_changeset(schema: &EntitySchema, value: &Entity) -> Result<Changeset> {
    let mut changeset = Changeset::new(schema.blank()).with_action(Action::Insert);

    for field in schema.fields() {
        if let Some(v) = value.get(&field.name) {
            changeset.force_change(field.name.clone(), v.clone());
        }
    }

    for relation in schema.relations() {
        let input = value
            .embed(relation.field())
            .map(EmbedInput::from)
            .unwrap_or_else(|| EmbedInput::none(relation.cardinality()));
        let (nested, valid) = change_relation(relation, input, &empty(relation))?;
        changeset
            .changes
            .insert(relation.field().to_string(), Change::Embed(nested));
        changeset.valid &= valid;
    }

    Ok(changeset)
}

/// Update descriptor: only what differs between the value and current
fn update_changeset(schema: &EntitySchema, value: &Entity, current: &Entity) -> Result<Changeset> {
    let mut changeset = Changeset::new(current.clone()).with_action(Action::Update);

    for field in schema.fields() {
        if let Some(v) = value.get(&field.name) {
            changeset.put_change(field.name.clone(), v.clone());
        }
    }

    for relation in schema.relations() {
        let embedded = match value.embed(relation.field()) {
            Some(embedded) => embedded,
            None => continue,
        };
        let fallback = empty(relation);
        let existing = current.embed(relation.field()).unwrap_or(&fallback);
        let (nested, valid) = change_relation(relation, EmbedInput::from(embedded), existing)?;
        if !nested.is_noop() {
            changeset
                .changes
                .insert(relation.field().to_string(), Change::Embed(nested));
        }
        changeset.valid &= valid;
    }

    Ok(changeset)
}

/// Delete descriptor for an entity that is going away
///
/// No validation runs. Every nested relation is diffed as cleared against
/// its current value, so nested entities are marked for deletion as well.
pub(crate) fn delete_changeset(schema: &EntitySchema, entity: &Entity) -> Result<Changeset> {
    let mut changeset = Changeset::new(entity.clone()).with_action(Action::Delete);

    for relation in schema.relations() {
        let fallback = empty(relation);
        let existing = entity.embed(relation.field()).unwrap_or(&fallback);
        let (nested, _) =
            change_relation(relation, EmbedInput::none(relation.cardinality()), existing)?;
        changeset
            .changes
            .insert(relation.field().to_string(), Change::Embed(nested));
    }

    tracing::debug!(schema = schema.name(), "delete descriptor built");
    Ok(changeset)
}
