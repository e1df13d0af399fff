//! Storage adapter contract
//!
//! The engine talks to storage through one operation only: generating a
//! primary key value for an insert whose schema declares autogeneration.

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{EmbedError, Result};
use crate::model::FieldType;

/// Id generation keyed by the primary key's declared field type
pub trait Adapter: Send + Sync {
    /// Produce a fresh primary key value
    ///
    /// # Errors
    ///
    /// Implementations return `EmbedError::Adapter` when they cannot
    /// generate a value of `field_type`; the engine propagates it unchanged.
    fn autogenerate(&self, field_type: FieldType) -> Result<Value>;
}

/// Generates time-ordered UUIDv7 strings for `uuid` primary keys
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidAdapter;

impl Adapter for UuidAdapter {
    fn autogenerate(&self, field_type: FieldType) -> Result<Value> {
        match field_type {
            FieldType::Uuid => Ok(Value::String(Uuid::now_v7().to_string())),
            other => Err(EmbedError::Adapter {
                message: format!("cannot autogenerate a {} primary key", other),
            }),
        }
    }
}
