//! Callback dispatcher
//!
//! Walks a validated relation aggregate depth-first at flush time, running
//! the lifecycle hooks that match each changeset's action and generating
//! primary keys for inserts. A child's whole before/recurse/after cycle runs
//! strictly between its parent's before and after hooks.

use std::time::Instant;

use crate::adapter::Adapter;
use crate::changeset::{Action, Change, Changeset, EmbedChange};
use crate::errors::{EmbedError, Result};
use crate::model::{EntitySchema, Relation};
use crate::{log_op_end, log_op_error, log_op_start};

/// When a hook runs relative to the persistence of its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

/// A lifecycle hook kind: phase × action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hook {
    pub phase: Phase,
    pub action: Action,
}

impl Hook {
    pub fn new(phase: Phase, action: Action) -> Self {
        Self { phase, action }
    }
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Before => "before",
            Phase::After => "after",
        };
        write!(f, "{}_{}", phase, self.action)
    }
}

/// Lifecycle-hook registry
///
/// Hooks receive the changeset by value and return it, possibly with extra
/// changes. Changing the action is a contract violation.
pub trait Callbacks: Send + Sync {
    /// Run `hook` for an entity of `schema`
    ///
    /// # Errors
    ///
    /// Hook failures are returned as-is to the caller of
    /// [`apply_each_callback`].
    fn apply(&self, hook: Hook, schema: &EntitySchema, changeset: Changeset) -> Result<Changeset>;
}

/// Runs no hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {
    fn apply(&self, _hook: Hook, _schema: &EntitySchema, changeset: Changeset) -> Result<Changeset> {
        Ok(changeset)
    }
}

/// Run lifecycle hooks over a relation aggregate
///
/// Returns the aggregate with generated keys and hook changes recorded in
/// place. Updates without changes are passed through untouched.
///
/// # Errors
///
/// - `CardinalityMismatch` - the aggregate does not match the relation
/// - `InvalidChangeset` - a changeset is invalid or carries no action
/// - `SchemaMismatch` - a changeset's data is not of the nested schema
/// - `MissingAutogenerate` - an insert has no key and none can be generated
/// - `HookChangedAction` - a hook altered the action
/// - any adapter or hook error
pub fn apply_each_callback(
    relation: &Relation,
    change: EmbedChange,
    adapter: &dyn Adapter,
    callbacks: &dyn Callbacks,
) -> Result<EmbedChange> {
    log_op_start!("apply_each_callback", relation = relation.field());
    let start = Instant::now();

    let result = dispatch_relation(relation, change, adapter, callbacks).map_err(|e| {
        log_op_error!(
            "apply_each_callback",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "apply_each_callback",
        duration_ms = start.elapsed().as_millis() as u64
    );

    Ok(result)
}

fn dispatch_relation(
    relation: &Relation,
    change: EmbedChange,
    adapter: &dyn Adapter,
    callbacks: &dyn Callbacks,
) -> Result<EmbedChange> {
    if change.cardinality() != relation.cardinality() {
        return Err(EmbedError::CardinalityMismatch {
            field: relation.field().to_string(),
            expected: relation.cardinality().to_string(),
        });
    }

    match change {
        EmbedChange::One(None) => Ok(EmbedChange::One(None)),
        EmbedChange::One(Some(changeset)) => {
            let changeset = dispatch(relation, *changeset, adapter, callbacks)?;
            Ok(EmbedChange::One(Some(Box::new(changeset))))
        }
        EmbedChange::Many(changesets) => changesets
            .into_iter()
            .map(|changeset| dispatch(relation, changeset, adapter, callbacks))
            .collect::<Result<Vec<_>>>()
            .map(EmbedChange::Many),
    }
}

fn dispatch(
    relation: &Relation,
    mut changeset: Changeset,
    adapter: &dyn Adapter,
    callbacks: &dyn Callbacks,
) -> Result<Changeset> {
    let related = relation.related();

    if changeset.action == Some(Action::Update) && changeset.changes.is_empty() {
        return Ok(changeset);
    }

    let action = match changeset.action {
        Some(action) if changeset.valid => action,
        _ => {
            return Err(EmbedError::InvalidChangeset {
                schema: related.name().to_string(),
            })
        }
    };

    if changeset.data.schema() != related.name() {
        return Err(EmbedError::SchemaMismatch {
            field: relation.field().to_string(),
            expected: related.name().to_string(),
            found: changeset.data.schema().to_string(),
        });
    }

    changeset = run_hook(Hook::new(Phase::Before, action), related, changeset, callbacks)?;

    if action == Action::Insert {
        autogenerate(related, &mut changeset, adapter)?;
    }

    for nested in related.relations() {
        if let Some(Change::Embed(inner)) = changeset.changes.get_mut(nested.field()) {
            let taken = std::mem::replace(inner, EmbedChange::Many(Vec::new()));
            *inner = dispatch_relation(nested, taken, adapter, callbacks)?;
        }
    }

    run_hook(Hook::new(Phase::After, action), related, changeset, callbacks)
}

fn run_hook(
    hook: Hook,
    schema: &EntitySchema,
    changeset: Changeset,
    callbacks: &dyn Callbacks,
) -> Result<Changeset> {
    tracing::debug!(schema = schema.name(), hook = %hook, "running hook");
    let changeset = callbacks.apply(hook, schema, changeset)?;

    match changeset.action {
        Some(action) if action == hook.action => Ok(changeset),
        found => Err(EmbedError::HookChangedAction {
            hook: hook.to_string(),
            expected: hook.action.to_string(),
            found: found.map_or_else(|| "none".to_string(), |a| a.to_string()),
        }),
    }
}

/// Record a generated primary key unless one is already set
fn autogenerate(schema: &EntitySchema, changeset: &mut Changeset, adapter: &dyn Adapter) -> Result<()> {
    let key = schema.primary_key();
    if matches!(changeset.get_field(key), Some(value) if !value.is_null()) {
        return Ok(());
    }

    let field_type = schema
        .autogenerate()
        .ok_or_else(|| EmbedError::MissingAutogenerate {
            schema: schema.name().to_string(),
            field: key.to_string(),
        })?;

    let value = adapter.autogenerate(field_type)?;
    tracing::debug!(schema = schema.name(), field = key, "primary key generated");
    changeset.force_change(key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::UuidAdapter;
    use crate::model::{Cardinality, Entity, FieldType};
    use serde_json::json;
    use std::sync::Arc;

    fn relation(autogenerate: bool) -> Relation {
        let mut builder = EntitySchema::builder("tag").primary_key("id", FieldType::Uuid);
        if autogenerate {
            builder = builder.autogenerate();
        }
        Relation::builder("tags")
            .cardinality(Cardinality::Many)
            .related(Arc::new(builder.build().unwrap()))
            .build()
            .unwrap()
    }

    fn insert() -> Changeset {
        Changeset::new(Entity::new("tag").with("id", serde_json::Value::Null))
            .with_action(Action::Insert)
    }

    #[test]
    fn test_hook_display() {
        assert_eq!(
            Hook::new(Phase::Before, Action::Insert).to_string(),
            "before_insert"
        );
        assert_eq!(
            Hook::new(Phase::After, Action::Delete).to_string(),
            "after_delete"
        );
    }

    #[test]
    fn test_insert_gets_generated_key() {
        let change = EmbedChange::Many(vec![insert()]);
        let result = dispatch_relation(&relation(true), change, &UuidAdapter, &NoopCallbacks).unwrap();

        let changeset = result.changesets().next().unwrap();
        assert!(changeset.get_value_change("id").unwrap().is_string());
    }

    #[test]
    fn test_supplied_key_is_kept() {
        let mut changeset = insert();
        changeset.force_change("id", json!("given"));
        let result = dispatch_relation(
            &relation(false),
            EmbedChange::Many(vec![changeset]),
            &UuidAdapter,
            &NoopCallbacks,
        )
        .unwrap();

        let changeset = result.changesets().next().unwrap();
        assert_eq!(changeset.get_value_change("id"), Some(&json!("given")));
    }

    #[test]
    fn test_missing_key_without_autogenerate_is_fatal() {
        let result = dispatch_relation(
            &relation(false),
            EmbedChange::Many(vec![insert()]),
            &UuidAdapter,
            &NoopCallbacks,
        );
        assert!(matches!(
            result,
            Err(EmbedError::MissingAutogenerate { schema, field }) if schema == "tag" && field == "id"
        ));
    }

    #[test]
    fn test_invalid_changeset_is_fatal() {
        let mut changeset = insert();
        changeset.add_error("id", "is bad", None);
        let result = dispatch_relation(
            &relation(true),
            EmbedChange::Many(vec![changeset]),
            &UuidAdapter,
            &NoopCallbacks,
        );
        assert!(matches!(result, Err(EmbedError::InvalidChangeset { .. })));
    }
}
