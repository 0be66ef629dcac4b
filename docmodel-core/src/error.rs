//! Error types for store access, schema declaration and model operations.
//!
//! Store-facing calls return [`DocumentStoreResult<T>`]; everything at the model
//! level returns [`ModelResult<T>`], which wraps store errors unchanged.

use bson::{Bson, error::Error as BsonError};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Errors raised by a storage backend or while converting documents.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given identity already exists in the collection.
    /// The first argument is the identity, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The document has an invalid structure (not a map, bad `_id`, ...).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// A malformed model declaration, or a key that the model does not declare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing collection name")]
    MissingCollection,
    #[error("missing fields")]
    MissingFields,
    /// Entry at the given position is not a `(name, unique)` pair.
    #[error("malformed field spec at position {0}")]
    MalformedField(usize),
    /// Entry at the given position has a non-string name or a non-boolean flag.
    #[error("invalid field types at position {0}")]
    InvalidFieldTypes(usize),
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
    /// The name cannot be used as a document key.
    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),
    /// A value was supplied for a key the model does not declare.
    #[error("{0} is not a field of collection {1}")]
    UnknownField(String, String),
}

/// Errors surfaced by models and their instances.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    /// The store could not be reached or configured at bind time.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The value is already reserved for another document.
    #[error("Duplicate value {value} for unique field {field}")]
    DuplicateValue { field: String, value: Bson },
    #[error("Not found: {0}")]
    NotFound(String),
    /// The instance's document was deleted through this instance.
    #[error("Instance has been deleted")]
    Deleted,
    #[error(transparent)]
    Store(#[from] DocumentStoreError),
}

/// A specialized `Result` type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Store(err.into())
    }
}

impl ModelError {
    /// Returns `true` if this is a uniqueness violation on `field`.
    pub fn is_duplicate_of(&self, field: &str) -> bool {
        matches!(self, ModelError::DuplicateValue { field: f, .. } if f == field)
    }
}
