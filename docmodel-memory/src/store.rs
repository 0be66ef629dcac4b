//! In-memory storage implementation for document stores.
//!
//! Collections are vectors of BSON documents in insertion order, guarded by a
//! single async-aware read-write lock. Every write takes the lock exclusively, so
//! the `_id` check and the insert of [`StoreBackend::insert_one`] form one step.

use std::{collections::HashMap, sync::Arc, vec};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, Uuid};
use tracing::trace;

use docmodel_core::{
    backend::{BoxedCursor, DocumentCursor, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::Expr,
};

use crate::evaluator::{DocumentEvaluator, double_is_integer};

type StoreMap = HashMap<String, Vec<Document>>;


/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Every lookup scans the collection. Meant for tests and small data sets.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::{backend::StoreBackend, query::Filter};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_one("users", doc! { "name": "Alice" }).await?;
/// let alice = store.find_one("users", &Filter::eq("_id", id)).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of every collection that has received a document.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        names
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

fn is_match(document: &Document, filter: &Expr) -> DocumentStoreResult<bool> {
    DocumentEvaluator::new(document).evaluate(filter)
}

/// Whether two `_id` values name the same document, following a unique index:
/// numbers compare by value across widths, NaN equals NaN, arrays and
/// documents compare element by element in order, and every other value must
/// be identical.
fn same_identity(left: &Bson, right: &Bson) -> bool {
    match (left, right) {
        (Bson::Double(a), Bson::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Bson::Double(double), other) | (other, Bson::Double(double)) => {
            integer_of(other).is_some_and(|int| double_is_integer(*double, int))
        }
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            integer_of(left) == integer_of(right)
        }
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_identity(a, b))
        }
        (Bson::Document(a), Bson::Document(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((ka, va), (kb, vb))| ka == kb && same_identity(va, vb))
        }
        _ => left == right,
    }
}

fn integer_of(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(int) => Some(i64::from(*int)),
        Bson::Int64(int) => Some(*int),
        _ => None,
    }
}

/// Writes `set` into `document`. Returns whether anything changed.
fn apply_set(document: &mut Document, set: &Document) -> bool {
    let mut changed = false;

    for (field, value) in set {
        if document.get(field) != Some(value) {
            document.insert(field.clone(), value.clone());
            changed = true;
        }
    }

    changed
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson> {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => Bson::from(Uuid::new()),
        };

        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        let taken = documents.iter().any(|existing| {
            existing
                .get(ID_FIELD)
                .is_some_and(|existing| same_identity(existing, &id))
        });

        if taken {
            trace!(collection, %id, "duplicate _id rejected");
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
        }

        let document = std::iter::once((ID_FIELD.to_string(), id.clone()))
            .chain(document.into_iter().filter(|(key, _)| key != ID_FIELD))
            .collect::<Document>();
        documents.push(document);

        Ok(id)
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<Option<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(None);
        };

        for document in documents {
            if is_match(document, filter)? {
                return Ok(Some(document.clone()));
            }
        }

        Ok(None)
    }

    async fn find(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<BoxedCursor> {
        let store = self.store.read().await;
        let matched = match store.get(collection) {
            Some(documents) => DocumentEvaluator::filter_documents(documents, filter)?,
            None => Vec::new(),
        };

        Ok(Box::new(SnapshotCursor::new(matched)))
    }

    async fn update_one(&self, collection: &str, filter: &Expr, set: Document) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        for document in documents.iter_mut() {
            if is_match(document, filter)? {
                let modified = apply_set(document, &set);

                return Ok(UpdateOutcome { matched: 1, modified: modified as u64 });
            }
        }

        Ok(UpdateOutcome::default())
    }

    async fn update_many(&self, collection: &str, filter: &Expr, set: Document) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        let mut outcome = UpdateOutcome::default();

        for document in documents.iter_mut() {
            if is_match(document, filter)? {
                outcome.matched += 1;

                if apply_set(document, &set) {
                    outcome.modified += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        for position in 0..documents.len() {
            if is_match(&documents[position], filter)? {
                documents.remove(position);
                return Ok(1);
            }
        }

        Ok(0)
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let doomed = documents
            .iter()
            .map(|document| is_match(document, filter))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let before = documents.len();
        let mut doomed = doomed.into_iter();
        documents.retain(|_| !doomed.next().unwrap_or(false));

        Ok((before - documents.len()) as u64)
    }
}


/// Cursor over a copy of the matches taken when the cursor was opened.
#[derive(Debug)]
pub struct SnapshotCursor {
    documents: vec::IntoIter<Document>,
}

impl SnapshotCursor {
    fn new(documents: Vec<Document>) -> Self {
        Self { documents: documents.into_iter() }
    }
}

#[async_trait]
impl DocumentCursor for SnapshotCursor {
    async fn next_batch(&mut self, size: usize) -> DocumentStoreResult<Vec<Document>> {
        Ok(self.documents.by_ref().take(size).collect())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Always succeeds with an empty store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
