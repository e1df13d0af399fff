//! Change descriptors
//!
//! A [`Changeset`] records, for one entity, the base data it was computed
//! against, the field-level changes, the action to perform and whether the
//! result is valid. Nested relation changes are stored inside the parent's
//! changes as an [`EmbedChange`], so a parent changeset is the aggregate of
//! its whole nested tree.
//!
//! ## Validity
//!
//! Field errors stay on the changeset that produced them. A parent only
//! learns that a nested changeset is invalid through its own `valid` flag;
//! use [`traverse_errors`] to collect every error in the tree.

pub mod traverse;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::Result;
use crate::model::{empty, Cardinality, Entity, Relation};
use crate::ops::cast::{cast_relation, CastOutcome};
use crate::ops::change::{change_relation, EmbedInput};

pub use traverse::traverse_errors;

/// What the persistence layer must do with a nested entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Insert => f.write_str("insert"),
            Action::Update => f.write_str("update"),
            Action::Delete => f.write_str("delete"),
        }
    }
}

/// A single recorded change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// New value of a scalar field
    Value(Value),
    /// Changes to a nested relation
    Embed(EmbedChange),
}

/// Changes to one nested relation (the relation aggregate)
///
/// For `Many`, inserted and updated entries come first in input order,
/// followed by deletions in the order of the current collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedChange {
    One(Option<Box<Changeset>>),
    Many(Vec<Changeset>),
}

/// A field-level validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    /// Name of the validation that failed, e.g. `required`
    pub validation: Option<String>,
}

/// Change descriptor for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    /// Base entity the changes apply to (a blank entity for inserts)
    pub data: Entity,
    /// Changed fields; order is irrelevant
    pub changes: BTreeMap<String, Change>,
    /// Set by the pipelines; `None` only on a changeset still being built
    pub action: Option<Action>,
    pub valid: bool,
    pub errors: Vec<FieldError>,
    /// Fields checked by `validate_required`
    pub required: Vec<String>,
}

impl Changeset {
    /// A valid changeset over `data` with no changes and no action yet
    pub fn new(data: Entity) -> Self {
        Self {
            data,
            changes: BTreeMap::new(),
            action: None,
            valid: true,
            errors: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn action(&self) -> Option<Action> {
        self.action
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn get_change(&self, field: &str) -> Option<&Change> {
        self.changes.get(field)
    }

    /// The new value of a scalar field, if it changed
    pub fn get_value_change(&self, field: &str) -> Option<&Value> {
        match self.changes.get(field) {
            Some(Change::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// The nested changes recorded for a relation field, if any
    pub fn get_embed_change(&self, field: &str) -> Option<&EmbedChange> {
        match self.changes.get(field) {
            Some(Change::Embed(change)) => Some(change),
            _ => None,
        }
    }

    /// The effective scalar value: the change if present, the data otherwise
    pub fn get_field(&self, field: &str) -> Option<&Value> {
        self.get_value_change(field).or_else(|| self.data.get(field))
    }

    /// Record a scalar change unless it equals the base value
    ///
    /// Putting back the base value removes an earlier change to the field.
    pub fn put_change(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        let current = self.data.get(&field).unwrap_or(&Value::Null);
        if *current == value {
            self.changes.remove(&field);
        } else {
            self.changes.insert(field, Change::Value(value));
        }
    }

    /// Record a scalar change even when it equals the base value
    pub fn force_change(&mut self, field: impl Into<String>, value: Value) {
        self.changes.insert(field.into(), Change::Value(value));
    }

    /// Attach an error to `field` and mark the changeset invalid
    pub fn add_error(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        validation: Option<&str>,
    ) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
            validation: validation.map(str::to_string),
        });
        self.valid = false;
    }

    /// Check that every field in `fields` has a non-blank effective value
    ///
    /// Null and whitespace-only strings count as blank.
    pub fn validate_required(&mut self, fields: &[String]) {
        for field in fields {
            if !self.required.contains(field) {
                self.required.push(field.clone());
            }
            let blank = match self.get_field(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            let already_reported = self.errors.iter().any(|e| &e.field == field);
            if blank && !already_reported {
                self.add_error(field.clone(), "can't be blank", Some("required"));
            }
        }
    }

    /// Cast raw params for a nested relation into this changeset
    ///
    /// The nested result is stored under the relation field and its validity
    /// is ANDed into this changeset. A shape error becomes one "is invalid"
    /// error on the relation field. No-op results are not recorded.
    ///
    /// # Errors
    ///
    /// Propagates fatal errors from the cast pipeline.
    pub fn cast_embed(&mut self, relation: &Relation, params: &Value) -> Result<()> {
        let fallback = empty(relation);
        let current = self.data.embed(relation.field()).unwrap_or(&fallback);

        match cast_relation(relation, params, current)? {
            CastOutcome::Changed { change, valid } => self.record_embed(relation, change, valid),
            CastOutcome::Invalid => {
                self.changes.remove(relation.field());
                self.add_error(relation.field(), "is invalid", Some("embed"));
            }
        }
        Ok(())
    }

    /// Diff already-materialized values for a nested relation into this changeset
    ///
    /// # Errors
    ///
    /// Propagates fatal errors from the change pipeline.
    pub fn put_embed(&mut self, relation: &Relation, input: EmbedInput) -> Result<()> {
        let fallback = empty(relation);
        let current = self.data.embed(relation.field()).unwrap_or(&fallback);

        let (change, valid) = change_relation(relation, input, current)?;
        self.record_embed(relation, change, valid);
        Ok(())
    }

    fn record_embed(&mut self, relation: &Relation, change: EmbedChange, valid: bool) {
        if change.is_noop() {
            self.changes.remove(relation.field());
        } else {
            self.changes
                .insert(relation.field().to_string(), Change::Embed(change));
        }
        self.valid &= valid;
    }

    /// Materialize the entity this changeset describes
    ///
    /// Scalar changes overwrite the base fields; nested changes are applied
    /// recursively with deletions dropped.
    pub fn apply_changes(&self) -> Entity {
        let mut entity = self.data.clone();
        for (field, change) in &self.changes {
            match change {
                Change::Value(value) => entity.put(field.clone(), value.clone()),
                Change::Embed(nested) => {
                    entity.put_embed(field.clone(), crate::apply::materialize(nested))
                }
            }
        }
        entity
    }
}

impl EmbedChange {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            EmbedChange::One(_) => Cardinality::One,
            EmbedChange::Many(_) => Cardinality::Many,
        }
    }

    /// AND of every contained changeset's validity
    pub fn is_valid(&self) -> bool {
        self.changesets().all(|cs| cs.valid)
    }

    /// True when applying this change would leave the relation as it was
    ///
    /// That is: nothing at all, or only valid updates without changes.
    pub fn is_noop(&self) -> bool {
        self.changesets()
            .all(|cs| cs.valid && cs.action == Some(Action::Update) && cs.changes.is_empty())
    }

    /// Iterate over the contained changesets in order
    pub fn changesets(&self) -> Box<dyn Iterator<Item = &Changeset> + '_> {
        match self {
            EmbedChange::One(changeset) => Box::new(changeset.as_deref().into_iter()),
            EmbedChange::Many(changesets) => Box::new(changesets.iter()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> Entity {
        Entity::new("person")
            .with("id", json!(1))
            .with("name", json!("Ada"))
    }

    #[test]
    fn test_put_change_skips_unchanged_values() {
        let mut changeset = Changeset::new(person());
        changeset.put_change("name", json!("Ada"));
        assert!(changeset.changes.is_empty());

        changeset.put_change("name", json!("Grace"));
        assert_eq!(changeset.get_value_change("name"), Some(&json!("Grace")));

        changeset.put_change("name", json!("Ada"));
        assert!(changeset.get_change("name").is_none());
    }

    #[test]
    fn test_get_field_prefers_changes() {
        let mut changeset = Changeset::new(person());
        assert_eq!(changeset.get_field("name"), Some(&json!("Ada")));
        changeset.force_change("name", json!("Ada L."));
        assert_eq!(changeset.get_field("name"), Some(&json!("Ada L.")));
        assert_eq!(changeset.get_field("missing"), None);
    }

    #[test]
    fn test_validate_required_records_blank_fields() {
        let mut changeset = Changeset::new(person());
        changeset.put_change("name", json!("   "));
        changeset.validate_required(&["name".to_string(), "id".to_string()]);

        assert!(!changeset.is_valid());
        assert_eq!(changeset.required, vec!["name".to_string(), "id".to_string()]);
        assert_eq!(changeset.errors.len(), 1);
        assert_eq!(changeset.errors[0].field, "name");
        assert_eq!(changeset.errors[0].validation.as_deref(), Some("required"));
    }

    #[test]
    fn test_apply_changes_overwrites_scalars() {
        let mut changeset = Changeset::new(person()).with_action(Action::Update);
        changeset.put_change("name", json!("Grace"));
        let applied = changeset.apply_changes();
        assert_eq!(applied.get("name"), Some(&json!("Grace")));
        assert_eq!(applied.get("id"), Some(&json!(1)));
    }

    #[test]
    fn test_embed_change_noop_and_validity() {
        let noop = Changeset::new(person()).with_action(Action::Update);
        let mut invalid = Changeset::new(person()).with_action(Action::Update);
        invalid.add_error("name", "is bad", None);
        let insert = Changeset::new(person()).with_action(Action::Insert);

        assert!(EmbedChange::One(None).is_noop());
        assert!(EmbedChange::Many(vec![noop.clone()]).is_noop());
        assert!(!EmbedChange::Many(vec![noop.clone(), insert]).is_noop());
        assert!(!EmbedChange::One(Some(Box::new(invalid.clone()))).is_noop());

        assert!(EmbedChange::Many(vec![noop.clone()]).is_valid());
        assert!(!EmbedChange::Many(vec![noop, invalid]).is_valid());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Insert.to_string(), "insert");
        assert_eq!(Action::Delete.to_string(), "delete");
    }
}
