//! Cast pipeline: raw, untrusted params into nested changesets
//!
//! Every nested entity that survives pairing is handed to the relation's
//! change-builder, which owns field validation. The pipeline only decides
//! which base entity the builder sees and which action the result carries.

use serde_json::{Map, Value};
use std::time::Instant;

use super::change::delete_changeset;
use crate::changeset::{Action, Changeset, EmbedChange};
use crate::diff::{canonical_key, diff_collection, Pair};
use crate::errors::{EmbedError, Result};
use crate::model::{Cardinality, Embedded, Entity, Relation};
use crate::{log_op_end, log_op_error, log_op_start};

/// Result of casting params for one relation
#[derive(Debug, Clone, PartialEq)]
pub enum CastOutcome {
    /// The relation aggregate plus the AND of every descriptor's validity
    Changed { change: EmbedChange, valid: bool },
    /// The params had the wrong shape; nothing was built
    Invalid,
}

impl CastOutcome {
    pub fn is_valid(&self) -> bool {
        match self {
            CastOutcome::Changed { valid, .. } => *valid,
            CastOutcome::Invalid => false,
        }
    }
}

/// Cast raw params for a nested relation against its current value
///
/// | params           | cardinality | result                                    |
/// |------------------|-------------|-------------------------------------------|
/// | `null`           | one         | delete of current, or `One(None)`         |
/// | object           | one         | update of current on key match, else insert |
/// | array of objects | many        | key-paired inserts, updates and deletes   |
/// | anything else    | either      | [`CastOutcome::Invalid`]                  |
///
/// # Errors
///
/// - `CardinalityMismatch` - `current` does not match the relation
/// - `MissingCurrentKey` - a current collection entry has no primary key
/// - anything the change-builder returns
pub fn cast(relation: &Relation, params: &Value, current: &Embedded) -> Result<CastOutcome> {
    log_op_start!("cast", relation = relation.field());
    let start = Instant::now();

    let outcome = cast_relation(relation, params, current).map_err(|e| {
        log_op_error!(
            "cast",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "cast",
        duration_ms = start.elapsed().as_millis() as u64,
        valid = outcome.is_valid()
    );

    Ok(outcome)
}

pub(crate) fn cast_relation(
    relation: &Relation,
    params: &Value,
    current: &Embedded,
) -> Result<CastOutcome> {
    if current.cardinality() != relation.cardinality() {
        return Err(EmbedError::CardinalityMismatch {
            field: relation.field().to_string(),
            expected: relation.cardinality().to_string(),
        });
    }

    let related = relation.related();
    match (relation.cardinality(), params) {
        (Cardinality::One, Value::Null) => {
            let change = match current.as_one() {
                Some(entity) => Some(Box::new(delete_changeset(related, entity)?)),
                None => None,
            };
            Ok(CastOutcome::Changed {
                change: EmbedChange::One(change),
                valid: true,
            })
        }
        (Cardinality::One, Value::Object(params)) => {
            let changeset = cast_one(relation, params, current.as_one())?;
            let valid = changeset.valid;
            Ok(CastOutcome::Changed {
                change: EmbedChange::One(Some(Box::new(changeset))),
                valid,
            })
        }
        (Cardinality::Many, Value::Array(items)) => {
            let params: Vec<&Map<String, Value>> =
                match items.iter().map(Value::as_object).collect::<Option<_>>() {
                    Some(params) => params,
                    None => {
                        tracing::debug!(relation = relation.field(), "non-object collection entry");
                        return Ok(CastOutcome::Invalid);
                    }
                };

            let key = related.primary_key();
            let (changesets, valid) = diff_collection(
                relation,
                params,
                current.as_many(),
                |params: &&Map<String, Value>| params.get(key).and_then(canonical_key),
                |pair| match pair {
                    Pair::Matched(params, entity) => cast_changeset(relation, params, Some(entity)),
                    Pair::New(params) => cast_changeset(relation, params, None),
                    Pair::Orphaned(entity) => delete_changeset(related, entity),
                },
            )?;
            Ok(CastOutcome::Changed {
                change: EmbedChange::Many(changesets),
                valid,
            })
        }
        (cardinality, _) => {
            tracing::debug!(
                relation = relation.field(),
                cardinality = %cardinality,
                "params of unexpected shape"
            );
            Ok(CastOutcome::Invalid)
        }
    }
}

/// Single relation: merge into current on key match, replace otherwise
///
/// With no current entity and no key in the params both sides are "no key",
/// which still pairs; the builder then sees a blank base and inserts.
fn cast_one(
    relation: &Relation,
    params: &Map<String, Value>,
    current: Option<&Entity>,
) -> Result<Changeset> {
    let related = relation.related();
    let incoming = params.get(related.primary_key()).and_then(canonical_key);
    let existing = current
        .and_then(|entity| related.primary_key_of(entity))
        .and_then(canonical_key);

    let base = match current {
        Some(entity) if incoming == existing => Some(entity),
        _ => None,
    };
    cast_changeset(relation, params, base)
}

fn cast_changeset(
    relation: &Relation,
    params: &Map<String, Value>,
    base: Option<&Entity>,
) -> Result<Changeset> {
    let (entity, action) = match base {
        Some(entity) => (entity.clone(), Action::Update),
        None => (relation.related().blank(), Action::Insert),
    };

    let mut changeset = relation.build_changeset(params, entity)?;
    changeset.action = Some(action);
    Ok(changeset)
}
