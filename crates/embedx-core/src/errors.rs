use thiserror::Error;

/// Result type alias using EmbedError
pub type Result<T> = std::result::Result<T, EmbedError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, log assertions and external API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Schema/registration
    MissingPrimaryKey,
    MultiplePrimaryKeys,
    DuplicateField,
    DuplicateSchema,
    InvalidRelation,
    UnknownSchema,
    UnknownRelation,

    // Caller contract
    MissingCurrentKey,
    CardinalityMismatch,
    ChangesetTargetMismatch,

    // Flush stage
    InvalidChangeset,
    SchemaMismatch,
    MissingAutogenerate,
    HookContract,

    // Collaborators
    Adapter,
    Hook,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::MissingPrimaryKey => "ERR_MISSING_PRIMARY_KEY",
            ExErrorKind::MultiplePrimaryKeys => "ERR_MULTIPLE_PRIMARY_KEYS",
            ExErrorKind::DuplicateField => "ERR_DUPLICATE_FIELD",
            ExErrorKind::DuplicateSchema => "ERR_DUPLICATE_SCHEMA",
            ExErrorKind::InvalidRelation => "ERR_INVALID_RELATION",
            ExErrorKind::UnknownSchema => "ERR_UNKNOWN_SCHEMA",
            ExErrorKind::UnknownRelation => "ERR_UNKNOWN_RELATION",
            ExErrorKind::MissingCurrentKey => "ERR_MISSING_CURRENT_KEY",
            ExErrorKind::CardinalityMismatch => "ERR_CARDINALITY_MISMATCH",
            ExErrorKind::ChangesetTargetMismatch => "ERR_CHANGESET_TARGET_MISMATCH",
            ExErrorKind::InvalidChangeset => "ERR_INVALID_CHANGESET",
            ExErrorKind::SchemaMismatch => "ERR_SCHEMA_MISMATCH",
            ExErrorKind::MissingAutogenerate => "ERR_MISSING_AUTOGENERATE",
            ExErrorKind::HookContract => "ERR_HOOK_CONTRACT",
            ExErrorKind::Adapter => "ERR_ADAPTER",
            ExErrorKind::Hook => "ERR_HOOK",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification used by the logging macros plus the schema and
/// field context of the failure.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    schema: Option<String>,
    field: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            schema: None,
            field: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add schema context
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the schema context, if any
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Get the field context, if any
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, " (schema: {})", schema)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Fatal error taxonomy for the reconciliation engine
///
/// Every variant signals a schema or caller bug; none of them is produced by
/// bad end-user input. User input problems live on the changesets instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbedError {
    // ===== Schema Registration =====
    /// Schema declares no primary key field
    #[error("Schema {schema} does not declare a primary key")]
    MissingPrimaryKey { schema: String },

    /// Schema declares more than one primary key field
    #[error("Schema {schema} declares more than one primary key: {fields:?}")]
    MultiplePrimaryKeys { schema: String, fields: Vec<String> },

    /// Two fields (scalar or relation) share a name
    #[error("Schema {schema} declares field {field} more than once")]
    DuplicateField { schema: String, field: String },

    /// Schema name registered twice
    #[error("Schema already registered: {schema}")]
    DuplicateSchema { schema: String },

    /// Relation built without a cardinality
    #[error("Relation {field} is missing its cardinality")]
    MissingCardinality { field: String },

    /// Relation built without a nested schema
    #[error("Relation {field} is missing its nested schema")]
    MissingRelated { field: String },

    /// Schema name not present in the registry
    #[error("Schema not registered: {schema}")]
    UnknownSchema { schema: String },

    /// Relation field not declared on the owning schema
    #[error("Schema {schema} has no relation named {field}")]
    UnknownRelation { schema: String, field: String },

    // ===== Caller Contract =====
    /// A current nested entity carries no primary key value
    #[error("Current {schema} entity in relation {field} has no primary key value")]
    MissingCurrentKey { schema: String, field: String },

    /// Input or current value shape does not match the relation cardinality
    #[error("Relation {field} expects cardinality {expected}")]
    CardinalityMismatch { field: String, expected: String },

    /// Pre-built changeset targets an entity other than the attached one
    #[error("A nested change must target the entity already attached to the parent (relation {field})")]
    ChangesetTargetMismatch { field: String },

    // ===== Flush Stage =====
    /// An invalid changeset reached the callback stage
    #[error("Invalid {schema} changeset reached the callback stage")]
    InvalidChangeset { schema: String },

    /// Changeset data type differs from the relation's nested schema
    #[error("Relation {field} expects {expected} changesets, got {found}")]
    SchemaMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Insert without a primary key and without an autogenerate strategy
    #[error("No primary key supplied for {schema}.{field} and no autogenerate strategy declared")]
    MissingAutogenerate { schema: String, field: String },

    /// A lifecycle hook changed the changeset action
    #[error("Hook {hook} changed the action from {expected} to {found}")]
    HookChangedAction {
        hook: String,
        expected: String,
        found: String,
    },

    // ===== Collaborators =====
    /// Storage adapter failure
    #[error("Adapter error: {message}")]
    Adapter { message: String },

    /// Lifecycle hook failure
    #[error("Hook {hook} failed: {message}")]
    Hook { hook: String, message: String },
}

/// Conversion from EmbedError to ExError
///
/// Used by the logging macros to classify failures with a stable code.
impl From<EmbedError> for ExError {
    fn from(err: EmbedError) -> Self {
        let message = err.to_string();
        match err {
            EmbedError::MissingPrimaryKey { schema } => {
                ExError::new(ExErrorKind::MissingPrimaryKey).with_schema(schema)
            }
            EmbedError::MultiplePrimaryKeys { schema, .. } => {
                ExError::new(ExErrorKind::MultiplePrimaryKeys).with_schema(schema)
            }
            EmbedError::DuplicateField { schema, field } => {
                ExError::new(ExErrorKind::DuplicateField)
                    .with_schema(schema)
                    .with_field(field)
            }
            EmbedError::DuplicateSchema { schema } => {
                ExError::new(ExErrorKind::DuplicateSchema).with_schema(schema)
            }
            EmbedError::MissingCardinality { field } | EmbedError::MissingRelated { field } => {
                ExError::new(ExErrorKind::InvalidRelation).with_field(field)
            }
            EmbedError::UnknownSchema { schema } => {
                ExError::new(ExErrorKind::UnknownSchema).with_schema(schema)
            }
            EmbedError::UnknownRelation { schema, field } => {
                ExError::new(ExErrorKind::UnknownRelation)
                    .with_schema(schema)
                    .with_field(field)
            }
            EmbedError::MissingCurrentKey { schema, field } => {
                ExError::new(ExErrorKind::MissingCurrentKey)
                    .with_schema(schema)
                    .with_field(field)
            }
            EmbedError::CardinalityMismatch { field, .. } => {
                ExError::new(ExErrorKind::CardinalityMismatch).with_field(field)
            }
            EmbedError::ChangesetTargetMismatch { field } => {
                ExError::new(ExErrorKind::ChangesetTargetMismatch).with_field(field)
            }
            EmbedError::InvalidChangeset { schema } => {
                ExError::new(ExErrorKind::InvalidChangeset).with_schema(schema)
            }
            EmbedError::SchemaMismatch { field, found, .. } => {
                ExError::new(ExErrorKind::SchemaMismatch)
                    .with_schema(found)
                    .with_field(field)
            }
            EmbedError::MissingAutogenerate { schema, field } => {
                ExError::new(ExErrorKind::MissingAutogenerate)
                    .with_schema(schema)
                    .with_field(field)
            }
            EmbedError::HookChangedAction { .. } => ExError::new(ExErrorKind::HookContract),
            EmbedError::Adapter { .. } => ExError::new(ExErrorKind::Adapter),
            EmbedError::Hook { .. } => ExError::new(ExErrorKind::Hook),
        }
        .with_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_stage_error_kind_codes() {
        let cases = [
            (ExErrorKind::InvalidChangeset, "ERR_INVALID_CHANGESET"),
            (ExErrorKind::SchemaMismatch, "ERR_SCHEMA_MISMATCH"),
            (ExErrorKind::MissingAutogenerate, "ERR_MISSING_AUTOGENERATE"),
            (ExErrorKind::HookContract, "ERR_HOOK_CONTRACT"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_embed_error_converts_with_context() {
        let err: ExError = EmbedError::MissingCurrentKey {
            schema: "address".into(),
            field: "addresses".into(),
        }
        .into();

        assert_eq!(err.kind(), ExErrorKind::MissingCurrentKey);
        assert_eq!(err.schema(), Some("address"));
        assert_eq!(err.field(), Some("addresses"));
        assert!(err.message().contains("no primary key value"));
    }

    #[test]
    fn test_target_mismatch_message() {
        let err = EmbedError::ChangesetTargetMismatch {
            field: "profile".into(),
        };
        assert!(err
            .to_string()
            .contains("must target the entity already attached to the parent"));
    }

    #[test]
    fn test_display_includes_code_and_op() {
        let err = ExError::new(ExErrorKind::Adapter)
            .with_op("apply_each_callback")
            .with_message("sequence exhausted");
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_ADAPTER]"));
        assert!(rendered.contains("apply_each_callback"));
        assert!(rendered.contains("sequence exhausted"));
    }
}
