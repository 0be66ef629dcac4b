//! Conversions between BSON documents, identities and serde types.

use bson::{
    Bson, Document, Uuid,
    de::deserialize_from_document,
    ser::serialize_to_document,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Key under which every document stores its identity.
pub const ID_FIELD: &str = "_id";

/// Extension methods for stored documents.
pub trait DocumentExt {
    /// Reads the document's `_id` as a UUID identity.
    ///
    /// Returns `Ok(None)` when `_id` is absent or null.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `_id` holds anything other
    /// than a UUID.
    fn identity(&self) -> DocumentStoreResult<Option<Uuid>>;

    /// Returns a copy without the `_id` key.
    fn without_identity(&self) -> Document;
}

impl DocumentExt for Document {
    fn identity(&self) -> DocumentStoreResult<Option<Uuid>> {
        match self.get(ID_FIELD) {
            None | Some(Bson::Null) => Ok(None),
            Some(value) => bson_to_identity(value).map(Some),
        }
    }

    fn without_identity(&self) -> Document {
        self.iter()
            .filter(|(key, _)| key.as_str() != ID_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Interprets a BSON value as a UUID identity.
pub fn bson_to_identity(value: &Bson) -> DocumentStoreResult<Uuid> {
    match value {
        Bson::Binary(binary) => binary
            .to_uuid()
            .map_err(|e| DocumentStoreError::InvalidDocument(e.to_string())),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a UUID identity, found {other}"
        ))),
    }
}

/// Serializes a value into a BSON document.
///
/// # Errors
///
/// Returns an error if the value does not serialize to a map.
pub fn to_document<T: Serialize>(value: &T) -> DocumentStoreResult<Document> {
    Ok(serialize_to_document(value)?)
}

/// Deserializes a BSON document into a typed value.
pub fn from_document<T: DeserializeOwned>(document: Document) -> DocumentStoreResult<T> {
    Ok(deserialize_from_document(document)?)
}
