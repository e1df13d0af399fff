pub mod entity;
pub mod relation;
pub mod schema;

pub use entity::{Embedded, Entity};
pub use relation::{empty, Cardinality, ChangeBuilder, Relation, RelationBuilder, Strategy};
pub use schema::{EntitySchema, FieldDef, FieldType, Registry, SchemaBuilder};
