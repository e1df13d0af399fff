//! Applier: materialize final nested values from a relation aggregate
//!
//! ## Contract
//!
//! - **Deletions drop out**: a deleted single entity becomes `One(None)`; a
//!   deleted collection entry is omitted.
//! - **Recursive**: nested aggregates inside each changeset are applied the
//!   same way, so the result is the full post-change tree.
//! - **Pure**: the aggregate is only read; callers keep ownership.
//!
//! ## Example
//!
//! ```
//! use embedx_core::{apply_changes, change, EmbedInput, Embedded, Entity, EntitySchema, FieldType};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let tag = Arc::new(
//!     EntitySchema::builder("tag")
//!         .primary_key("id", FieldType::Id)
//!         .field("label", FieldType::String)
//!         .build()
//!         .unwrap(),
//! );
//! let post = EntitySchema::builder("post")
//!     .primary_key("id", FieldType::Id)
//!     .embeds_many("tags", tag)
//!     .build()
//!     .unwrap();
//! let relation = post.relation("tags").unwrap();
//!
//! let value = Entity::new("tag").with("id", json!(1)).with("label", json!("rust"));
//! let (aggregate, _) = change(relation, EmbedInput::Many(vec![value.into()]), &Embedded::Many(vec![])).unwrap();
//!
//! let applied = apply_changes(relation, &aggregate).unwrap();
//! assert_eq!(applied.as_many()[0].get("label"), Some(&json!("rust")));
//! ```

use std::time::Instant;

use crate::changeset::{Action, Changeset, EmbedChange};
use crate::errors::{EmbedError, Result};
use crate::model::{Embedded, Relation};
use crate::{log_op_end, log_op_error, log_op_start};

/// Materialize the value a relation holds after `change` is persisted
///
/// # Errors
///
/// Returns `CardinalityMismatch` if the aggregate's shape does not match the
/// relation.
pub fn apply_changes(relation: &Relation, change: &EmbedChange) -> Result<Embedded> {
    log_op_start!("apply_changes", relation = relation.field());
    let start = Instant::now();

    if change.cardinality() != relation.cardinality() {
        let err = EmbedError::CardinalityMismatch {
            field: relation.field().to_string(),
            expected: relation.cardinality().to_string(),
        };
        log_op_error!(
            "apply_changes",
            err.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        return Err(err);
    }

    let applied = materialize(change);

    log_op_end!(
        "apply_changes",
        duration_ms = start.elapsed().as_millis() as u64
    );

    Ok(applied)
}

pub(crate) fn materialize(change: &EmbedChange) -> Embedded {
    match change {
        EmbedChange::One(changeset) => Embedded::One(
            changeset
                .as_deref()
                .filter(|cs| !is_delete(cs))
                .map(|cs| Box::new(cs.apply_changes())),
        ),
        EmbedChange::Many(changesets) => Embedded::Many(
            changesets
                .iter()
                .filter(|cs| !is_delete(cs))
                .map(Changeset::apply_changes)
                .collect(),
        ),
    }
}

fn is_delete(changeset: &Changeset) -> bool {
    changeset.action == Some(Action::Delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, Entity, EntitySchema, FieldType};
    use serde_json::json;
    use std::sync::Arc;

    fn relation(cardinality: Cardinality) -> Relation {
        let tag = EntitySchema::builder("tag")
            .primary_key("id", FieldType::Id)
            .field("label", FieldType::String)
            .build()
            .unwrap();
        Relation::builder("tags")
            .cardinality(cardinality)
            .related(Arc::new(tag))
            .build()
            .unwrap()
    }

    fn tag(id: i64) -> Entity {
        Entity::new("tag").with("id", json!(id))
    }

    #[test]
    fn test_one_delete_becomes_none() {
        let delete = Changeset::new(tag(1)).with_action(Action::Delete);
        let applied = apply_changes(
            &relation(Cardinality::One),
            &EmbedChange::One(Some(Box::new(delete))),
        )
        .unwrap();
        assert_eq!(applied, Embedded::One(None));
    }

    #[test]
    fn test_many_drops_deletions_and_applies_changes() {
        let mut update = Changeset::new(tag(1)).with_action(Action::Update);
        update.put_change("label", json!("kept"));
        let delete = Changeset::new(tag(2)).with_action(Action::Delete);

        let applied = apply_changes(
            &relation(Cardinality::Many),
            &EmbedChange::Many(vec![update, delete]),
        )
        .unwrap();

        let entities = applied.as_many();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].get("label"), Some(&json!("kept")));
    }

    #[test]
    fn test_shape_must_match_relation() {
        let result = apply_changes(&relation(Cardinality::One), &EmbedChange::Many(vec![]));
        assert!(matches!(result, Err(EmbedError::CardinalityMismatch { .. })));
    }
}
