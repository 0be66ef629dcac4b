//! Storage backend abstraction.
//!
//! A [`StoreBackend`] is the asynchronous document store the model layer talks to:
//! single and bulk updates and deletes, single inserts, point lookups, cursors and
//! a liveness probe. Implementations must be safe to share across tasks.
//!
//! The one hard requirement the uniqueness protocol places on a backend is that
//! [`StoreBackend::insert_one`] refuses a document whose `_id` already exists in
//! the collection, reporting
//! [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists).
//! Two concurrent inserts with the same `_id` must never both succeed.
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::{backend::StoreBackend, query::Filter};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! backend.ping().await?;
//!
//! let id = backend.insert_one("users", doc! { "name": "Alice" }).await?;
//! let found = backend.find_one("users", &Filter::eq("_id", id)).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{error::DocumentStoreResult, query::Expr};

/// Result of an update call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents matched by the filter.
    pub matched: u64,
    /// Number of documents actually changed.
    pub modified: u64,
}

/// A server- or memory-side cursor over the results of [`StoreBackend::find`].
#[async_trait]
pub trait DocumentCursor: Send + Debug {
    /// Pulls up to `size` further documents.
    ///
    /// Returns an empty vector once the cursor is exhausted.
    async fn next_batch(&mut self, size: usize) -> DocumentStoreResult<Vec<Document>>;
}

pub type BoxedCursor = Box<dyn DocumentCursor>;

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks. The exact concurrency model is implementation-specific.
///
/// # Error Handling
///
/// All failures are reported as [`DocumentStoreError`](crate::error::DocumentStoreError)
/// and propagated unchanged by the layers above.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Checks that the store is reachable.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Inserts one document and returns its `_id`.
    ///
    /// A document without `_id` gets one assigned by the backend. A document
    /// whose `_id` is already present in the collection is rejected with
    /// `DocumentAlreadyExists`.
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Opens a cursor over every document matching `filter`.
    async fn find(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<BoxedCursor>;

    /// Sets the fields of `set` on the first document matching `filter`.
    ///
    /// Fields not named in `set` are left untouched.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Sets the fields of `set` on every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        set: Document,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter`. Returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Deletes every document matching `filter`. Returns the number deleted.
    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Releases connections and other resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Factory for backends that need asynchronous setup.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
