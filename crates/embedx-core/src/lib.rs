//! embedx core - nested-entity change reconciliation
//!
//! Given the nested relation of a parent entity (one embedded entity or an
//! ordered collection) and new input, this crate computes one changeset per
//! nested entity stating whether it is inserted, updated or deleted, the
//! exact field-level differences, and whether the result is valid.
//!
//! - [`cast`] validates raw params through each relation's change-builder
//! - [`change`] diffs already-materialized values structurally
//! - [`apply_each_callback`] runs lifecycle hooks and key generation at flush
//! - [`apply_changes`] materializes the post-change nested values
//!
//! Everything is synchronous and operates on owned, acyclic trees; schemas
//! and relations are immutable once built and safe to share across threads.

pub mod adapter;
pub mod apply;
pub mod callbacks;
pub mod changeset;
pub mod diff;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod ops;

pub use embedx_core_types as core_types;

// Re-export commonly used types
pub use adapter::{Adapter, UuidAdapter};
pub use apply::apply_changes;
pub use callbacks::{apply_each_callback, Callbacks, Hook, NoopCallbacks, Phase};
pub use changeset::{traverse_errors, Action, Change, Changeset, EmbedChange, FieldError};
pub use errors::{EmbedError, ExError, ExErrorKind, Result};
pub use model::{
    empty, Cardinality, ChangeBuilder, Embedded, Entity, EntitySchema, FieldDef, FieldType,
    Registry, Relation, RelationBuilder, SchemaBuilder, Strategy,
};
pub use ops::{cast, change, CastOutcome, ChangeInput, EmbedInput};
