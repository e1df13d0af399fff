//! Primary-key alignment of an input sequence against a current collection.
//!
//! The current collection is indexed once into an immutable key → position
//! map; a parallel vector of consumed markers enforces one-to-one matching.
//! Runs in O(n + m) time with O(m) auxiliary space.

use serde_json::Value;
use std::collections::HashMap;

use crate::changeset::Changeset;
use crate::errors::{EmbedError, Result};
use crate::model::{Entity, Relation};

/// One pairing produced by [`diff_collection`]
#[derive(Debug)]
pub enum Pair<'a, I> {
    /// Input item whose key matched an unconsumed current entity
    Matched(I, &'a Entity),
    /// Input item with no key, or a key nothing current carries
    New(I),
    /// Current entity no input item claimed; scheduled for deletion
    Orphaned(&'a Entity),
}

/// Canonical lookup key for a primary key value; `None` for null
pub fn canonical_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Pair `inputs` with `current` by primary key and build one changeset per pair
///
/// Results follow input order, then orphaned current entities in their
/// original order. Every pair is built even after an invalid one, so all
/// nested errors stay visible; the returned flag ANDs their validity.
///
/// # Errors
///
/// - `MissingCurrentKey` - a current entity has no primary key value
/// - anything `build` returns
pub fn diff_collection<'a, I, K, B>(
    relation: &Relation,
    inputs: Vec<I>,
    current: &'a [Entity],
    key_of: K,
    mut build: B,
) -> Result<(Vec<Changeset>, bool)>
where
    K: Fn(&I) -> Option<String>,
    B: FnMut(Pair<'a, I>) -> Result<Changeset>,
{
    let related = relation.related();

    let mut index: HashMap<String, usize> = HashMap::with_capacity(current.len());
    for (position, entity) in current.iter().enumerate() {
        let key = related
            .primary_key_of(entity)
            .and_then(canonical_key)
            .ok_or_else(|| EmbedError::MissingCurrentKey {
                schema: related.name().to_string(),
                field: relation.field().to_string(),
            })?;
        index.entry(key).or_insert(position);
    }

    let mut consumed = vec![false; current.len()];
    let mut changesets = Vec::with_capacity(inputs.len() + current.len());
    let mut valid = true;

    for item in inputs {
        let matched = key_of(&item)
            .and_then(|key| index.get(&key).copied())
            .filter(|position| !consumed[*position]);

        let pair = match matched {
            Some(position) => {
                consumed[position] = true;
                Pair::Matched(item, &current[position])
            }
            None => Pair::New(item),
        };

        let changeset = build(pair)?;
        valid &= changeset.valid;
        changesets.push(changeset);
    }

    let aligned = changesets.len();
    for (entity, _) in current
        .iter()
        .zip(consumed.iter())
        .filter(|(_, consumed)| !**consumed)
    {
        let changeset = build(Pair::Orphaned(entity))?;
        valid &= changeset.valid;
        changesets.push(changeset);
    }

    tracing::debug!(
        relation = relation.field(),
        current_len = current.len(),
        aligned,
        orphaned = changesets.len() - aligned,
        valid,
        "collection diffed"
    );

    Ok((changesets, valid))
}
