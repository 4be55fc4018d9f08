use thiserror::Error;

/// Errors raised while turning a record declaration into an `EntityDescriptor`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Missing entity metadata on {0}")]
    MissingEntityMetadata(String),

    #[error("Unsupported value kind `{type_name}` for field {entity}.{field}")]
    UnsupportedFieldKind {
        entity: String,
        field: String,
        type_name: String,
    },

    #[error("Duplicate field {entity}.{field}")]
    DuplicateField { entity: String, field: String },

    #[error("Field {entity}.{field} is auto-increment but not a primary key")]
    AutoIncrementWithoutPrimaryKey { entity: String, field: String },

    #[error("Auto-increment field {entity}.{field} must have an integer kind")]
    AutoIncrementNotInteger { entity: String, field: String },

    #[error("Auto-increment field {entity}.{field} cannot be part of a composite key")]
    AutoIncrementInCompositeKey { entity: String, field: String },

    #[error("Unique group on {entity} references unknown field {field}")]
    UnknownUniqueField { entity: String, field: String },

    #[error("Empty unique group on {0}")]
    EmptyUniqueGroup(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Entity {0} has no primary key")]
    MissingPrimaryKey(String),

    #[error("Entity {0} has no non-key columns to update")]
    NothingToUpdate(String),

    #[error("Operation {operation} declares {count} capabilities")]
    AmbiguousCapability { operation: String, count: usize },

    #[error("Operation {0} has no capability and no default body")]
    UnannotatedOperation(String),

    #[error("Operation {operation} cannot return {contract}")]
    UnsupportedReturnContract { operation: String, contract: String },

    #[error("Query returned no rows")]
    NoSuchRow,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Unsupported value kind {kind} in {context}")]
    UnsupportedValueKind { context: String, kind: &'static str },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Entity {0} is declared more than once")]
    DuplicateEntity(String),

    #[error("Operation {0} is declared more than once")]
    DuplicateOperation(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Unknown accessor: {0}")]
    UnknownAccessor(String),

    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("Return mismatch: expected {expected}, got {actual}")]
    ReturnMismatch {
        expected: &'static str,
        actual: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::StorageError(e.to_string())
    }
}
