use thiserror::Error;

/// Declaration-time configuration errors.
///
/// These surface while an entity type declares its shape and are never
/// recovered from at runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Field '{field}' on '{entity}' uses the reserved prefix '_'")]
    ReservedField { entity: String, field: String },

    #[error("Invalid field name '{field}' on '{entity}'")]
    InvalidField { entity: String, field: String },

    #[error("'{0}' is not a valid entity type")]
    InvalidEntityType(String),

    #[error("Field '{field}' on '{entity}' is already declared as {existing}")]
    Conflict {
        entity: String,
        field: String,
        existing: String,
    },

    #[error("Entity '{entity}' already declares primary key '{existing}'")]
    DuplicatePrimaryKey { entity: String, existing: String },

    #[error("One-to-many relation '{field}' on '{entity}' requires a back-reference field")]
    MissingBackReference { entity: String, field: String },
}

/// Failures reported by a document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document '{id}' already exists in '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("Document '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors raised by mapper operations.
#[derive(Error, Debug)]
pub enum MapperError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Entity '{0}' has not been saved yet")]
    NotPersisted(String),

    #[error("Primary key '{field}' on '{entity}' must be a string")]
    InvalidPrimaryKey { entity: String, field: String },

    #[error("Relation '{field}' on '{entity}' expects '{expected}', got '{actual}'")]
    RelationTypeMismatch {
        entity: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Field '{field}' is not declared on '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("Entity type '{0}' has not been registered")]
    UnknownEntityType(String),

    /// An unsaved entity was reached again through a cycle longer than a
    /// direct back-reference.
    #[error("Save of '{entity}' reached it again through a cycle of {length} unsaved entities")]
    SaveCycle { entity: String, length: usize },

    #[error("Cascade delete of '{entity}' aborted: {source}")]
    CascadeAborted {
        entity: String,
        #[source]
        source: Box<MapperError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, MapperError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
