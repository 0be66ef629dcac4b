//! Handle to a single named collection.
//!
//! [`Collection`] is what [`StoreHandle::collection`](crate::store::StoreHandle::collection)
//! hands out and what models expose through `raw_collection`. It is cheap to clone
//! and holds a shared reference to the backend, so it can outlive the call that
//! produced it.
//!
//! ```ignore
//! let users = store.collection("users");
//! users.insert_one(doc! { "name": "Alice" }).await?;
//! let alice = users.find_one(&Filter::eq("name", "Alice")).await?;
//! ```

use bson::{Bson, Document};
use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::{BoxedCursor, StoreBackend, UpdateOutcome},
    error::DocumentStoreResult,
    query::Expr,
};

#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    backend: Arc<dyn StoreBackend>,
}

impl Collection {
    pub(crate) fn new(name: String, backend: Arc<dyn StoreBackend>) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts a document and returns its `_id`.
    ///
    /// # Errors
    ///
    /// Returns `DocumentAlreadyExists` if a document with the same `_id` is present.
    pub async fn insert_one(&self, document: Document) -> DocumentStoreResult<Bson> {
        debug!(collection = %self.name, "insert_one");

        self.backend.insert_one(&self.name, document).await
    }

    /// Returns the first document matching `filter`.
    pub async fn find_one(&self, filter: &Expr) -> DocumentStoreResult<Option<Document>> {
        debug!(collection = %self.name, ?filter, "find_one");

        self.backend.find_one(&self.name, filter).await
    }

    /// Opens a cursor over the documents matching `filter`.
    pub async fn find(&self, filter: &Expr) -> DocumentStoreResult<BoxedCursor> {
        debug!(collection = %self.name, ?filter, "find");

        self.backend.find(&self.name, filter).await
    }

    /// Applies `set` to the first document matching `filter`.
    pub async fn update_one(
        &self,
        filter: &Expr,
        set: Document,
    ) -> DocumentStoreResult<UpdateOutcome> {
        debug!(collection = %self.name, ?filter, fields = set.len(), "update_one");

        self.backend.update_one(&self.name, filter, set).await
    }

    /// Applies `set` to every document matching `filter`.
    pub async fn update_many(
        &self,
        filter: &Expr,
        set: Document,
    ) -> DocumentStoreResult<UpdateOutcome> {
        debug!(collection = %self.name, ?filter, fields = set.len(), "update_many");

        self.backend.update_many(&self.name, filter, set).await
    }

    /// Deletes the first document matching `filter`.
    pub async fn delete_one(&self, filter: &Expr) -> DocumentStoreResult<u64> {
        debug!(collection = %self.name, ?filter, "delete_one");

        self.backend.delete_one(&self.name, filter).await
    }

    /// Deletes every document matching `filter`.
    pub async fn delete_many(&self, filter: &Expr) -> DocumentStoreResult<u64> {
        debug!(collection = %self.name, ?filter, "delete_many");

        self.backend.delete_many(&self.name, filter).await
    }
}
